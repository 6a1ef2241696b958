use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::{Device, Message};
use tagwatch_rules::{bounded, DeviceDirectory};
use tagwatch_storage::MessageStore;

/// A stored message joined with its device record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageReportRow {
    pub device_id: i32,
    pub name: String,
    pub device_type: String,
    pub address: String,
    pub responsible: Vec<i32>,
    pub received_at: DateTime<Utc>,
    pub message: String,
    pub message_type: String,
}

/// Per-device message count joined with the device record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountReportRow {
    pub device_id: i32,
    pub name: String,
    pub device_type: String,
    pub address: String,
    pub responsible: Vec<i32>,
    pub count: u64,
}

/// Message history reports. Devices missing from the directory are shown
/// as the "unknown device" placeholder while keeping the stored device id.
pub struct ReportService {
    messages: Arc<dyn MessageStore>,
    directory: Arc<DeviceDirectory>,
    store_timeout: Duration,
}

impl ReportService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        directory: Arc<DeviceDirectory>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            messages,
            directory,
            store_timeout,
        }
    }

    pub async fn by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MessageReportRow>> {
        let messages = bounded(
            "messages_by_period",
            self.store_timeout,
            self.messages.messages_by_period(from, to),
        )
        .await?;
        Ok(messages.into_iter().map(|m| self.message_row(m)).collect())
    }

    pub async fn by_device(&self, device_id: i32) -> Result<Vec<MessageReportRow>> {
        let messages = bounded(
            "messages_by_device",
            self.store_timeout,
            self.messages.messages_by_device(device_id),
        )
        .await?;
        Ok(messages.into_iter().map(|m| self.message_row(m)).collect())
    }

    pub async fn count_by_message_type(&self, message_type: &str) -> Result<Vec<CountReportRow>> {
        let counts = bounded(
            "count_by_message_type",
            self.store_timeout,
            self.messages.count_by_message_type(message_type),
        )
        .await?;
        Ok(counts
            .into_iter()
            .map(|c| {
                let device = self.device(c.device_id);
                CountReportRow {
                    device_id: c.device_id,
                    name: device.name,
                    device_type: device.device_type,
                    address: device.address,
                    responsible: device.responsible,
                    count: c.count,
                }
            })
            .collect())
    }

    fn device(&self, device_id: i32) -> Device {
        self.directory
            .lookup(device_id)
            .map(|d| Device::clone(&d))
            .unwrap_or_else(Device::unknown)
    }

    fn message_row(&self, message: Message) -> MessageReportRow {
        let device = self.device(message.device_id);
        MessageReportRow {
            device_id: message.device_id,
            name: device.name,
            device_type: device.device_type,
            address: device.address,
            responsible: device.responsible,
            received_at: message.received_at,
            message: message.body,
            message_type: message.message_type,
        }
    }
}
