use crate::services::validate_rule;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tagwatch_common::types::{Device, TagRuleRow};
use tagwatch_storage::{DeviceStore, RuleStore};

// ---- Seed file types ----

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub devices: Vec<SeedDevice>,
    #[serde(default)]
    pub rules: Vec<SeedRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDevice {
    pub name: String,
    pub device_type: String,
    pub address: String,
    #[serde(default)]
    pub responsible: Vec<i32>,
}

/// Rules name their device by address; ids are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRule {
    pub name: String,
    pub device_address: String,
    pub pattern: String,
    pub compare_type: String,
    pub value: String,
    #[serde(default = "default_capture_index")]
    pub capture_index: i32,
    pub subject: String,
    #[serde(default = "default_seed_severity")]
    pub severity: String,
}

fn default_capture_index() -> i32 {
    1
}

fn default_seed_severity() -> String {
    "info".to_string()
}

impl SeedFile {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seed: Self = serde_json::from_str(&content)?;
        Ok(seed)
    }
}

/// Inserts seed devices and rules into empty stores. Stores that already
/// hold data are left untouched. Returns `(devices, rules)` inserted.
pub async fn apply_seed(
    seed: &SeedFile,
    devices: &dyn DeviceStore,
    rules: &dyn RuleStore,
) -> Result<(usize, usize)> {
    let existing_devices = devices.list_devices().await?;
    let mut ids: HashMap<String, i32> = existing_devices
        .iter()
        .map(|d| (d.address.clone(), d.id))
        .collect();

    let mut device_count = 0;
    if existing_devices.is_empty() {
        for entry in &seed.devices {
            let created = devices
                .create_device(&Device {
                    id: 0,
                    name: entry.name.clone(),
                    device_type: entry.device_type.clone(),
                    address: entry.address.clone(),
                    responsible: entry.responsible.clone(),
                    created_at: None,
                    updated_at: None,
                })
                .await?;
            ids.insert(created.address, created.id);
            device_count += 1;
        }
    } else {
        tracing::info!(
            existing = existing_devices.len(),
            "Device store not empty, skipping device seed"
        );
    }

    let mut rule_count = 0;
    if rules.list_rules().await?.is_empty() {
        for entry in &seed.rules {
            let Some(&device_id) = ids.get(&entry.device_address) else {
                tracing::warn!(
                    rule = %entry.name,
                    address = %entry.device_address,
                    "Seed rule references unknown device, skipping"
                );
                continue;
            };
            let row = TagRuleRow {
                id: 0,
                name: entry.name.clone(),
                device_id,
                pattern: entry.pattern.clone(),
                compare_type: entry.compare_type.clone(),
                value: entry.value.clone(),
                capture_index: entry.capture_index,
                subject: entry.subject.clone(),
                severity: entry.severity.clone(),
                created_at: None,
                updated_at: None,
            };
            if let Err(e) = validate_rule(&row) {
                tracing::warn!(rule = %entry.name, error = %e, "Invalid seed rule, skipping");
                continue;
            }
            rules.create_rule(&row).await?;
            rule_count += 1;
        }
    } else {
        tracing::info!("Rule store not empty, skipping rule seed");
    }

    tracing::info!(devices = device_count, rules = rule_count, "Seed applied");
    Ok((device_count, rule_count))
}
