//! Tag rule engine for classifying device messages.
//!
//! Stored tag rules are compiled into matchers ([`compiler`]) and held per
//! device in an atomically swapped [`cache::RuleCache`]. The
//! [`classifier::Classifier`] evaluates an inbound message against its
//! device's rules in load order; the first rule whose pattern matches and
//! whose comparison holds decides the alert. Threshold rules (`<`, `>`)
//! additionally drive the [`hysteresis`] protocol, which creates and removes
//! paired recovery rules so alerts clear themselves.

pub mod cache;
pub mod classifier;
pub mod compiler;
pub mod directory;
pub mod error;
pub mod hysteresis;
pub mod matcher;
mod snapshot;

#[cfg(test)]
mod tests;

pub use cache::{RuleCache, RuleSnapshot};
pub use classifier::{Classification, Classifier};
pub use directory::{DeviceDirectory, DeviceSnapshot};
pub use error::{bounded, CompileError, EngineError, Result};
pub use hysteresis::{HysteresisAction, HysteresisManager};
pub use matcher::{CompareOp, Comparison, CompiledRule};

/// Subject reserved for recovery rules. A `<`/`>` rule with this subject is
/// always treated as the recovery half of a hysteresis pair.
pub const RECOVERY_SUBJECT: &str = "OK";
