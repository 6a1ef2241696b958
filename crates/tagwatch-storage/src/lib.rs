//! Persistence collaborators for devices, tag rules and messages.
//!
//! The rule engine only sees these traits. [`memory::MemoryStore`] is the
//! bundled implementation; a database-backed store implements the same
//! traits and is swapped in at wiring time.

pub mod error;
pub mod memory;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagwatch_common::types::{Device, Message, TagRuleRow};

pub use error::{Result, StorageError};
pub use memory::MemoryStore;

/// Partial device update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub address: Option<String>,
    pub responsible: Option<Vec<i32>>,
}

/// Partial tag rule update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagRuleUpdate {
    pub name: Option<String>,
    pub device_id: Option<i32>,
    pub pattern: Option<String>,
    pub compare_type: Option<String>,
    pub value: Option<String>,
    pub capture_index: Option<i32>,
    pub subject: Option<String>,
    pub severity: Option<String>,
}

/// Number of messages of one type received from one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceMessageCount {
    pub device_id: i32,
    pub count: u64,
}

/// Device directory backing store.
///
/// Implementations must be `Send + Sync`: the store is shared between the
/// ingestion path, the health checker and the administrative services.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Returns every device, in insertion order.
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Inserts a device. The id in `device` is ignored and assigned by the store.
    async fn create_device(&self, device: &Device) -> Result<Device>;

    async fn update_device(&self, id: i32, update: &DeviceUpdate) -> Result<Device>;

    async fn delete_device(&self, id: i32) -> Result<()>;
}

/// Tag rule backing store.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Returns every rule in load order. The rule cache preserves this order
    /// when evaluating a device's rules.
    async fn list_rules(&self) -> Result<Vec<TagRuleRow>>;

    /// Inserts a rule. The id in `rule` is ignored and assigned by the store.
    async fn create_rule(&self, rule: &TagRuleRow) -> Result<TagRuleRow>;

    async fn update_rule(&self, id: i32, update: &TagRuleUpdate) -> Result<TagRuleRow>;

    /// Deletes a rule. Returns [`StorageError::NotFound`] if it does not exist.
    async fn delete_rule(&self, id: i32) -> Result<()>;
}

/// Message history store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a classified message and returns it with its assigned id.
    async fn insert_message(&self, message: &Message) -> Result<Message>;

    /// Messages received in `[from, to]`, oldest first.
    async fn messages_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Message>>;

    /// Messages attributed to one device, oldest first.
    async fn messages_by_device(&self, device_id: i32) -> Result<Vec<Message>>;

    /// Per-device counts of messages with the given message type.
    async fn count_by_message_type(&self, message_type: &str) -> Result<Vec<DeviceMessageCount>>;
}
