use crate::compiler::compile_rules;
use crate::error::{bounded, Result};
use crate::matcher::CompiledRule;
use crate::snapshot::SnapshotCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::TagRuleRow;
use tagwatch_storage::RuleStore;

/// Compiled rules grouped by owning device, in load order.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    by_device: HashMap<i32, Vec<Arc<CompiledRule>>>,
    rule_count: usize,
}

impl RuleSnapshot {
    pub fn from_compiled(rules: Vec<CompiledRule>) -> Self {
        let rule_count = rules.len();
        let mut by_device: HashMap<i32, Vec<Arc<CompiledRule>>> = HashMap::new();
        for rule in rules {
            by_device
                .entry(rule.device_id())
                .or_default()
                .push(Arc::new(rule));
        }
        Self {
            by_device,
            rule_count,
        }
    }

    /// Rules for `device_id`; an unknown device has no rules.
    pub fn rules_for(&self, device_id: i32) -> &[Arc<CompiledRule>] {
        self.by_device
            .get(&device_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lookup(&self, device_id: i32) -> Option<&[Arc<CompiledRule>]> {
        self.by_device.get(&device_id).map(Vec::as_slice)
    }

    /// The active recovery rule paired with `original`, if any.
    pub fn recovery_for(&self, original: &TagRuleRow) -> Option<&Arc<CompiledRule>> {
        self.rules_for(original.device_id)
            .iter()
            .find(|rule| rule.is_recovery_twin_of(original))
    }

    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    pub fn device_count(&self) -> usize {
        self.by_device.len()
    }
}

/// Per-device compiled rule lists, rebuilt wholesale from the rule store.
pub struct RuleCache {
    cell: SnapshotCell<RuleSnapshot>,
}

impl Default for RuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleCache {
    pub fn new() -> Self {
        Self {
            cell: SnapshotCell::new(RuleSnapshot::default()),
        }
    }

    /// The current snapshot. Holding it keeps a consistent view even if a
    /// refresh lands meanwhile.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.cell.load()
    }

    /// Rules for `device_id` in the current snapshot, or `None` if the device
    /// has no active rules.
    pub fn lookup(&self, device_id: i32) -> Option<Vec<Arc<CompiledRule>>> {
        self.cell.load().lookup(device_id).map(<[_]>::to_vec)
    }

    /// Ticket of the last published snapshot; `0` before the first refresh.
    pub fn generation(&self) -> u64 {
        self.cell.generation()
    }

    /// Compiles `rows` and publishes them as the new snapshot. Returns the
    /// number of active rules.
    pub fn replace(&self, rows: &[TagRuleRow]) -> usize {
        let ticket = self.cell.ticket();
        self.publish_rows(ticket, rows)
    }

    /// Reads every rule from `store`, compiles them and swaps the snapshot.
    ///
    /// On error, timeout or cancellation the previous snapshot stays in place.
    pub async fn refresh(&self, store: &dyn RuleStore, timeout: Duration) -> Result<usize> {
        let ticket = self.cell.ticket();
        let rows = bounded("list_rules", timeout, store.list_rules()).await?;
        Ok(self.publish_rows(ticket, &rows))
    }

    fn publish_rows(&self, ticket: u64, rows: &[TagRuleRow]) -> usize {
        let snapshot = RuleSnapshot::from_compiled(compile_rules(rows));
        let count = snapshot.len();
        let skipped = rows.len() - count;
        if self.cell.publish(ticket, snapshot) {
            tracing::info!(rule_count = count, skipped, "Rule cache reloaded");
        } else {
            tracing::debug!(ticket, "Discarded stale rule snapshot");
        }
        count
    }
}
