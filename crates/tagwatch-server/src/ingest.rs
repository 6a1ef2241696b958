use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::{Device, Message, Severity, UNKNOWN_DEVICE_ID};
use tagwatch_notify::manager::{Delivery, NotificationManager};
use tagwatch_notify::Notification;
use tagwatch_rules::{bounded, Classifier};
use tagwatch_storage::MessageStore;

/// A message as received from a device, attributed by network address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub address: String,
    #[serde(rename = "message")]
    pub body: String,
    pub message_type: String,
    pub component: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// The persisted message, with its store id and final severity.
    pub message: Message,
    pub notify: bool,
    pub subject: String,
    pub text: String,
    /// `None` when no rule matched.
    pub delivery: Option<Delivery>,
}

/// Resolves, classifies, persists and notifies inbound messages.
pub struct MessageService {
    classifier: Arc<Classifier>,
    messages: Arc<dyn MessageStore>,
    notifier: Arc<NotificationManager>,
    store_timeout: Duration,
}

impl MessageService {
    pub fn new(
        classifier: Arc<Classifier>,
        messages: Arc<dyn MessageStore>,
        notifier: Arc<NotificationManager>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            messages,
            notifier,
            store_timeout,
        }
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub async fn ingest(&self, inbound: InboundMessage) -> Result<IngestOutcome> {
        let devices = self.classifier.devices();
        let device_id = devices
            .device_id_by_address(&inbound.address)
            .unwrap_or_else(|| {
                tracing::warn!(address = %inbound.address, "Message from unknown device");
                UNKNOWN_DEVICE_ID
            });

        let message = Message {
            id: 0,
            device_id,
            body: inbound.body,
            message_type: inbound.message_type,
            severity: None,
            component: inbound.component,
            received_at: Utc::now(),
        };

        let classification = self.classifier.classify(message).await?;
        let stored = bounded(
            "insert_message",
            self.store_timeout,
            self.messages.insert_message(&classification.message),
        )
        .await?;

        let delivery = if classification.notify {
            let device = devices
                .lookup(device_id)
                .map(|d| Device::clone(&d))
                .unwrap_or_else(Device::unknown);
            let notification = Notification {
                device_id,
                device_name: device.name,
                subject: classification.subject.clone(),
                text: classification.text.clone(),
                severity: stored.severity.unwrap_or(Severity::Info),
                recipients: device.responsible,
                created_at: stored.received_at,
            };
            Some(self.notifier.notify(&notification).await)
        } else {
            None
        };

        Ok(IngestOutcome {
            message: stored,
            notify: classification.notify,
            subject: classification.subject,
            text: classification.text,
            delivery,
        })
    }
}
