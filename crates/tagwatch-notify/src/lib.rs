//! Alert notification delivery.
//!
//! A classified message that should notify becomes a [`Notification`]. The
//! [`manager::NotificationManager`] suppresses repeats within a configured
//! period and routes the rest to [`NotificationChannel`] implementations
//! based on severity.

pub mod channels;
pub mod manager;
pub mod routing;


use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tagwatch_common::types::Severity;

/// An alert ready for delivery to the people responsible for a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub device_id: i32,
    pub device_name: String,
    /// Subject of the winning rule, e.g. `HIGH_TEMP` or `OK`.
    pub subject: String,
    /// Alert text; the body of the classified message.
    pub text: String,
    pub severity: Severity,
    /// Responsible-party ids of the device.
    pub recipients: Vec<i32>,
    pub created_at: DateTime<Utc>,
}

/// A delivery channel for notifications.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the notification through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails.
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Returns the channel type name (e.g., `"log"`).
    fn channel_name(&self) -> &str;
}
