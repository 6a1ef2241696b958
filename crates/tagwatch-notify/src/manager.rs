use crate::routing::ChannelRoute;
use crate::{Notification, NotificationChannel};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Outcome of [`NotificationManager::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to every channel whose route accepts the severity.
    Sent { channels: usize },
    /// The same device and text was already delivered within the period.
    Suppressed,
}

/// Routes notifications to channels, delivering an identical
/// (device, text) pair at most once per suppression period.
pub struct NotificationManager {
    channels: Vec<Box<dyn NotificationChannel>>,
    routes: Vec<ChannelRoute>,
    period: Duration,
    last_sent: Mutex<HashMap<(i32, String), DateTime<Utc>>>,
}

impl NotificationManager {
    /// `period_secs == 0` disables duplicate suppression.
    pub fn new(
        channels: Vec<Box<dyn NotificationChannel>>,
        routes: Vec<ChannelRoute>,
        period_secs: u64,
    ) -> Self {
        Self {
            channels,
            routes,
            period: Duration::seconds(period_secs.min(u64::from(u32::MAX)) as i64),
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Delivers `notification` unless it repeats one sent within the period.
    /// Suppression is measured against `notification.created_at`.
    pub async fn notify(&self, notification: &Notification) -> Delivery {
        if !self.period.is_zero() {
            let now = notification.created_at;
            let key = (notification.device_id, notification.text.clone());
            let mut last_sent = self.last_sent.lock().await;

            if let Some(sent_at) = last_sent.get(&key) {
                if now - *sent_at < self.period {
                    tracing::debug!(
                        device_id = notification.device_id,
                        subject = %notification.subject,
                        "Notification suppressed (duplicate within period)"
                    );
                    return Delivery::Suppressed;
                }
            }

            let period = self.period;
            last_sent.retain(|_, sent_at| now - *sent_at < period);
            last_sent.insert(key, now);
        }

        let channels = self.send_to_channels(notification).await;
        Delivery::Sent { channels }
    }

    async fn send_to_channels(&self, notification: &Notification) -> usize {
        let mut delivered = 0;
        for route in &self.routes {
            if !route.should_send(notification.severity) {
                continue;
            }

            if let Some(channel) = self.channels.get(route.channel_index) {
                match channel.send(notification).await {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        tracing::error!(
                            channel = channel.channel_name(),
                            device_id = notification.device_id,
                            error = %e,
                            "Failed to send notification"
                        );
                    }
                }
            }
        }
        delivered
    }

    pub fn channels(&self) -> &[Box<dyn NotificationChannel>] {
        &self.channels
    }

    /// Number of (device, text) pairs currently remembered for suppression.
    pub async fn tracked(&self) -> usize {
        self.last_sent.lock().await.len()
    }
}
