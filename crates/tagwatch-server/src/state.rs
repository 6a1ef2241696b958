use crate::config::ServerConfig;
use crate::ingest::MessageService;
use crate::reports::ReportService;
use crate::services::{DeviceService, RuleService};
use std::sync::Arc;
use tagwatch_common::types::Severity;
use tagwatch_notify::channels::LogChannel;
use tagwatch_notify::manager::NotificationManager;
use tagwatch_notify::routing::ChannelRoute;
use tagwatch_rules::Classifier;
use tagwatch_storage::MemoryStore;

/// Shared services over one backing store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<MemoryStore>,
    pub classifier: Arc<Classifier>,
    pub notifier: Arc<NotificationManager>,
    pub messages: Arc<MessageService>,
    pub rules: Arc<RuleService>,
    pub devices: Arc<DeviceService>,
    pub reports: Arc<ReportService>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: Arc<MemoryStore>) -> Self {
        let timeout = config.store_timeout();
        let classifier = Arc::new(Classifier::new(store.clone(), store.clone(), timeout));
        let notifier = Arc::new(NotificationManager::new(
            vec![Box::new(LogChannel::new())],
            vec![ChannelRoute {
                min_severity: Severity::Info,
                channel_index: 0,
            }],
            config.notification_period_secs,
        ));

        Self {
            messages: Arc::new(MessageService::new(
                classifier.clone(),
                store.clone(),
                notifier.clone(),
                timeout,
            )),
            rules: Arc::new(RuleService::new(classifier.clone(), store.clone(), timeout)),
            devices: Arc::new(DeviceService::new(classifier.clone(), store.clone(), timeout)),
            reports: Arc::new(ReportService::new(
                store.clone(),
                classifier.devices().clone(),
                timeout,
            )),
            config: Arc::new(config),
            store,
            classifier,
            notifier,
        }
    }

    /// Loads the device directory and rule cache from the store.
    pub async fn refresh_all(&self) -> anyhow::Result<()> {
        let devices = self.classifier.refresh_devices().await?;
        let rules = self.classifier.refresh_rules().await?;
        tracing::info!(devices, rules, "Caches loaded");
        Ok(())
    }
}
