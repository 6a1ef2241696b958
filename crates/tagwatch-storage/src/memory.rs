use crate::error::{Result, StorageError};
use crate::{
    DeviceMessageCount, DeviceStore, DeviceUpdate, MessageStore, RuleStore, TagRuleUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tagwatch_common::types::{Device, Message, TagRuleRow};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    devices: Vec<Device>,
    rules: Vec<TagRuleRow>,
    messages: Vec<Message>,
    last_device_id: i32,
    last_rule_id: i32,
    last_message_id: i64,
}

/// In-process store implementing all three collaborator traits.
///
/// Each single-record operation runs under one write lock, so it is atomic
/// with respect to every other operation on the same store. Rows are kept in
/// insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn device_count(&self) -> usize {
        self.tables.read().await.devices.len()
    }

    pub async fn rule_count(&self) -> usize {
        self.tables.read().await.rules.len()
    }

    pub async fn message_count(&self) -> usize {
        self.tables.read().await.messages.len()
    }
}

fn address_taken(devices: &[Device], address: &str, except_id: Option<i32>) -> bool {
    devices
        .iter()
        .any(|d| d.address == address && Some(d.id) != except_id)
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.tables.read().await.devices.clone())
    }

    async fn create_device(&self, device: &Device) -> Result<Device> {
        let mut tables = self.tables.write().await;
        if address_taken(&tables.devices, &device.address, None) {
            return Err(StorageError::Duplicate {
                entity: "device",
                key: device.address.clone(),
            });
        }

        tables.last_device_id += 1;
        let now = Utc::now();
        let row = Device {
            id: tables.last_device_id,
            created_at: Some(now),
            updated_at: None,
            ..device.clone()
        };
        tables.devices.push(row.clone());
        Ok(row)
    }

    async fn update_device(&self, id: i32, update: &DeviceUpdate) -> Result<Device> {
        let mut tables = self.tables.write().await;
        if let Some(address) = &update.address {
            if address_taken(&tables.devices, address, Some(id)) {
                return Err(StorageError::Duplicate {
                    entity: "device",
                    key: address.clone(),
                });
            }
        }

        let device = tables
            .devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "device",
                id: id.to_string(),
            })?;

        if let Some(name) = &update.name {
            device.name = name.clone();
        }
        if let Some(device_type) = &update.device_type {
            device.device_type = device_type.clone();
        }
        if let Some(address) = &update.address {
            device.address = address.clone();
        }
        if let Some(responsible) = &update.responsible {
            device.responsible = responsible.clone();
        }
        device.updated_at = Some(Utc::now());
        Ok(device.clone())
    }

    async fn delete_device(&self, id: i32) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.devices.len();
        tables.devices.retain(|d| d.id != id);
        if tables.devices.len() == before {
            return Err(StorageError::NotFound {
                entity: "device",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_rules(&self) -> Result<Vec<TagRuleRow>> {
        Ok(self.tables.read().await.rules.clone())
    }

    async fn create_rule(&self, rule: &TagRuleRow) -> Result<TagRuleRow> {
        let mut tables = self.tables.write().await;
        tables.last_rule_id += 1;
        let row = TagRuleRow {
            id: tables.last_rule_id,
            created_at: Some(Utc::now()),
            updated_at: None,
            ..rule.clone()
        };
        tables.rules.push(row.clone());
        Ok(row)
    }

    async fn update_rule(&self, id: i32, update: &TagRuleUpdate) -> Result<TagRuleRow> {
        let mut tables = self.tables.write().await;
        let rule = tables
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "tag_rule",
                id: id.to_string(),
            })?;

        if let Some(name) = &update.name {
            rule.name = name.clone();
        }
        if let Some(device_id) = update.device_id {
            rule.device_id = device_id;
        }
        if let Some(pattern) = &update.pattern {
            rule.pattern = pattern.clone();
        }
        if let Some(compare_type) = &update.compare_type {
            rule.compare_type = compare_type.clone();
        }
        if let Some(value) = &update.value {
            rule.value = value.clone();
        }
        if let Some(capture_index) = update.capture_index {
            rule.capture_index = capture_index;
        }
        if let Some(subject) = &update.subject {
            rule.subject = subject.clone();
        }
        if let Some(severity) = &update.severity {
            rule.severity = severity.clone();
        }
        rule.updated_at = Some(Utc::now());
        Ok(rule.clone())
    }

    async fn delete_rule(&self, id: i32) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.rules.len();
        tables.rules.retain(|r| r.id != id);
        if tables.rules.len() == before {
            return Err(StorageError::NotFound {
                entity: "tag_rule",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &Message) -> Result<Message> {
        let mut tables = self.tables.write().await;
        tables.last_message_id += 1;
        let row = Message {
            id: tables.last_message_id,
            ..message.clone()
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn messages_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.received_at >= from && m.received_at <= to)
            .cloned()
            .collect();
        found.sort_by_key(|m| (m.received_at, m.id));
        Ok(found)
    }

    async fn messages_by_device(&self, device_id: i32) -> Result<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.device_id == device_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| (m.received_at, m.id));
        Ok(found)
    }

    async fn count_by_message_type(&self, message_type: &str) -> Result<Vec<DeviceMessageCount>> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
        for message in tables
            .messages
            .iter()
            .filter(|m| m.message_type == message_type)
        {
            *counts.entry(message.device_id).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(device_id, count)| DeviceMessageCount { device_id, count })
            .collect())
    }
}
