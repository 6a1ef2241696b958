use crate::ingest::{InboundMessage, MessageService};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Result of probing one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Healthy,
    /// The device answered with a non-200 status.
    Unhealthy(u16),
    /// The device could not be reached.
    Unreachable(String),
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, address: &str) -> ProbeStatus;
}

/// Probes `GET http://<address>/healthcheck`.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, address: &str) -> ProbeStatus {
        let url = format!("http://{address}/healthcheck");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => ProbeStatus::Healthy,
            Ok(resp) => ProbeStatus::Unhealthy(resp.status().as_u16()),
            Err(e) => ProbeStatus::Unreachable(e.to_string()),
        }
    }
}

/// Periodically probes every known device and ingests a failure message for
/// each one that is unreachable or unhealthy.
pub struct HealthChecker {
    probe: Arc<dyn HealthProbe>,
    ingest: Arc<MessageService>,
    tick_secs: u64,
}

impl HealthChecker {
    pub fn new(probe: Arc<dyn HealthProbe>, ingest: Arc<MessageService>, tick_secs: u64) -> Self {
        Self {
            probe,
            ingest,
            tick_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Device health checker started");

        let mut tick = interval(Duration::from_secs(self.tick_secs.max(1)));
        loop {
            tick.tick().await;
            let failures = self.check_all().await;
            if failures > 0 {
                tracing::info!(failures, "Device health check cycle finished");
            }
        }
    }

    /// Probes each device address once. Returns the number of failure
    /// messages ingested.
    pub async fn check_all(&self) -> usize {
        let mut addresses = self.ingest.classifier().devices().addresses();
        addresses.sort();

        let mut failures = 0;
        for address in addresses {
            let body = match self.probe.probe(&address).await {
                ProbeStatus::Healthy => continue,
                ProbeStatus::Unhealthy(status) => {
                    tracing::warn!(address = %address, status, "Device health check failed");
                    format!("device {address} status is not OK")
                }
                ProbeStatus::Unreachable(reason) => {
                    tracing::warn!(address = %address, reason = %reason, "Device unreachable");
                    format!("unable to connect to device {address}")
                }
            };

            let message = InboundMessage {
                address,
                body,
                message_type: "error".to_string(),
                component: "General".to_string(),
            };
            match self.ingest.ingest(message).await {
                Ok(_) => failures += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to record device health failure");
                }
            }
        }
        failures
    }
}
