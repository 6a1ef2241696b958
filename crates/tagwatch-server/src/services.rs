//! Device and rule administration.
//!
//! Every mutation is written through the store and followed by a refresh of
//! the matching cache, so classification sees the change on the next message.

use crate::error::{Result, ServiceError};
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::{Device, TagRuleRow};
use tagwatch_rules::compiler::compile_rule;
use tagwatch_rules::{bounded, Classifier, RECOVERY_SUBJECT};
use tagwatch_storage::{DeviceStore, DeviceUpdate, RuleStore, TagRuleUpdate};

// ---- Rules ----

pub struct RuleService {
    classifier: Arc<Classifier>,
    store: Arc<dyn RuleStore>,
    store_timeout: Duration,
}

impl RuleService {
    pub fn new(classifier: Arc<Classifier>, store: Arc<dyn RuleStore>, store_timeout: Duration) -> Self {
        Self {
            classifier,
            store,
            store_timeout,
        }
    }

    pub async fn list(&self) -> Result<Vec<TagRuleRow>> {
        Ok(bounded("list_rules", self.store_timeout, self.store.list_rules()).await?)
    }

    pub async fn create(&self, rule: &TagRuleRow) -> Result<TagRuleRow> {
        validate_rule(rule)?;
        let created = bounded("create_rule", self.store_timeout, self.store.create_rule(rule)).await?;
        tracing::info!(rule_id = created.id, device_id = created.device_id, "Tag rule created");
        self.refresh().await;
        Ok(created)
    }

    /// Applies a partial update. The merged rule is validated before it is
    /// written. A recovery rule created by hysteresis may be edited and keeps
    /// its reserved subject; any other rule may not take it on.
    pub async fn update(&self, id: i32, update: &TagRuleUpdate) -> Result<TagRuleRow> {
        let existing = self
            .list()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(ServiceError::NotFound {
                entity: "tag_rule",
                id,
            })?;
        let was_recovery = compile_rule(&existing).is_ok_and(|r| r.is_recovery());
        let merged = merge_rule(existing, update);
        if was_recovery {
            compile_rule(&merged)?;
        } else {
            validate_rule(&merged)?;
        }

        let updated =
            bounded("update_rule", self.store_timeout, self.store.update_rule(id, update)).await?;
        tracing::info!(rule_id = id, "Tag rule updated");
        self.refresh().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        bounded("delete_rule", self.store_timeout, self.store.delete_rule(id)).await?;
        tracing::info!(rule_id = id, "Tag rule deleted");
        self.refresh().await;
        Ok(())
    }

    // The write already succeeded; a failed refresh leaves the cache stale
    // until the next one.
    async fn refresh(&self) {
        if let Err(e) = self.classifier.refresh_rules().await {
            tracing::error!(error = %e, "Failed to refresh rule cache after mutation");
        }
    }
}

fn merge_rule(mut rule: TagRuleRow, update: &TagRuleUpdate) -> TagRuleRow {
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
    rule
}

/// Rejects rules that would not compile and threshold rules that claim the
/// recovery subject.
pub(crate) fn validate_rule(rule: &TagRuleRow) -> Result<()> {
    let compiled = compile_rule(rule)?;
    if compiled.is_recovery() {
        return Err(ServiceError::ReservedSubject {
            subject: rule.subject.clone(),
        });
    }
    Ok(())
}

// ---- Devices ----

pub struct DeviceService {
    classifier: Arc<Classifier>,
    store: Arc<dyn DeviceStore>,
    store_timeout: Duration,
}

impl DeviceService {
    pub fn new(
        classifier: Arc<Classifier>,
        store: Arc<dyn DeviceStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            store,
            store_timeout,
        }
    }

    pub async fn create(&self, device: &Device) -> Result<Device> {
        let created =
            bounded("create_device", self.store_timeout, self.store.create_device(device)).await?;
        tracing::info!(device_id = created.id, address = %created.address, "Device created");
        self.refresh().await;
        Ok(created)
    }

    pub async fn update(&self, id: i32, update: &DeviceUpdate) -> Result<Device> {
        let updated = bounded(
            "update_device",
            self.store_timeout,
            self.store.update_device(id, update),
        )
        .await?;
        tracing::info!(device_id = id, "Device updated");
        self.refresh().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        bounded("delete_device", self.store_timeout, self.store.delete_device(id)).await?;
        tracing::info!(device_id = id, "Device deleted");
        self.refresh().await;
        Ok(())
    }

    async fn refresh(&self) {
        if let Err(e) = self.classifier.refresh_devices().await {
            tracing::error!(error = %e, "Failed to refresh device directory after mutation");
        }
    }
}
