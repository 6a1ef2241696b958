use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Upper bound for every store call made by the rule engine and services.
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    /// An identical (device, text) alert is delivered at most once per period.
    #[serde(default = "default_notification_period_secs")]
    pub notification_period_secs: u64,
    /// JSON file with initial devices and rules, applied to empty stores.
    #[serde(default)]
    pub seed_file: Option<String>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_health_check_enabled")]
    pub enabled: bool,
    #[serde(default = "default_health_check_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_health_check_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_check_enabled(),
            tick_secs: default_health_check_tick_secs(),
            timeout_secs: default_health_check_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: default_store_timeout_secs(),
            notification_period_secs: default_notification_period_secs(),
            seed_file: None,
            health_check: HealthCheckConfig::default(),
        }
    }
}

fn default_store_timeout_secs() -> u64 {
    5
}

fn default_notification_period_secs() -> u64 {
    300
}

fn default_health_check_enabled() -> bool {
    true
}

fn default_health_check_tick_secs() -> u64 {
    30
}

fn default_health_check_timeout_secs() -> u64 {
    5
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}
