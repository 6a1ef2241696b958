use crate::{Notification, NotificationChannel};
use anyhow::Result;
use async_trait::async_trait;

/// Writes notifications to the process log.
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            device_id = notification.device_id,
            device = %notification.device_name,
            subject = %notification.subject,
            severity = %notification.severity,
            recipients = ?notification.recipients,
            text = %notification.text,
            "Notification"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
