//! Process wiring for the tag-rule monitoring service.

pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod reports;
pub mod seed;
pub mod services;
pub mod state;
