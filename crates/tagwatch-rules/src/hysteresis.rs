use crate::cache::RuleCache;
use crate::error::{bounded, EngineError};
use crate::matcher::{CompareOp, CompiledRule};
use crate::RECOVERY_SUBJECT;
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::{Severity, TagRuleRow};
use tagwatch_storage::{RuleStore, StorageError};

/// Rule-store side effect of a winning `<`/`>` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HysteresisAction {
    /// The alerting rule fired and its recovery rule was created.
    RecoveryCreated { rule_id: i32, recovery_id: i32 },
    /// The alerting rule fired while its recovery rule was already active.
    RecoveryExists { rule_id: i32, recovery_id: i32 },
    /// The recovery rule fired and was removed; the alerting rule is armed again.
    RecoveryDeleted { recovery_id: i32 },
    /// The store rejected the create/delete; the rule state is unchanged.
    Failed { rule_id: i32 },
}

/// Builds the recovery rule paired with `original`: same device, pattern,
/// operand and capture index, flipped operator, the reserved subject and
/// informational severity.
pub fn recovery_rule_for(original: &TagRuleRow, flipped: CompareOp) -> TagRuleRow {
    TagRuleRow {
        id: 0,
        compare_type: flipped.to_string(),
        subject: RECOVERY_SUBJECT.to_string(),
        severity: Severity::Info.to_string(),
        created_at: None,
        updated_at: None,
        ..original.clone()
    }
}

/// Maintains recovery rules for threshold rules.
///
/// Per device and pattern the state is either *armed* (only the alerting rule
/// exists) or *tripped* (the alerting rule and its `"OK"` recovery rule both
/// exist). Store failures are logged and never fail classification.
pub struct HysteresisManager {
    store: Arc<dyn RuleStore>,
    cache: Arc<RuleCache>,
    store_timeout: Duration,
}

impl HysteresisManager {
    pub fn new(store: Arc<dyn RuleStore>, cache: Arc<RuleCache>, store_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            store_timeout,
        }
    }

    /// Applies the transition for a winning threshold rule and refreshes the
    /// rule cache so the next message sees the new state.
    pub async fn on_threshold_fired(&self, rule: &CompiledRule) -> HysteresisAction {
        let action = if rule.is_recovery() {
            self.disarm(rule).await
        } else {
            let existing = self
                .cache
                .snapshot()
                .recovery_for(rule.row())
                .map(|recovery| recovery.id());
            match existing {
                Some(recovery_id) => {
                    tracing::debug!(
                        rule_id = rule.id(),
                        recovery_id,
                        "Recovery rule already active"
                    );
                    return HysteresisAction::RecoveryExists {
                        rule_id: rule.id(),
                        recovery_id,
                    };
                }
                None => self.trip(rule).await,
            }
        };

        if let Err(e) = self.cache.refresh(self.store.as_ref(), self.store_timeout).await {
            tracing::error!(
                rule_id = rule.id(),
                error = %e,
                "Failed to refresh rule cache after hysteresis transition"
            );
        }
        action
    }

    async fn disarm(&self, recovery: &CompiledRule) -> HysteresisAction {
        let result = bounded(
            "delete_rule",
            self.store_timeout,
            self.store.delete_rule(recovery.id()),
        )
        .await;
        match result {
            Ok(()) => {
                tracing::info!(
                    recovery_id = recovery.id(),
                    device_id = recovery.device_id(),
                    "Recovery rule fired; condition cleared"
                );
                HysteresisAction::RecoveryDeleted {
                    recovery_id: recovery.id(),
                }
            }
            // A concurrent classification already removed it.
            Err(EngineError::Store {
                source: StorageError::NotFound { .. },
                ..
            }) => {
                tracing::warn!(
                    recovery_id = recovery.id(),
                    "Recovery rule already removed"
                );
                HysteresisAction::RecoveryDeleted {
                    recovery_id: recovery.id(),
                }
            }
            Err(e) => {
                tracing::error!(
                    recovery_id = recovery.id(),
                    error = %e,
                    "Failed to delete recovery rule"
                );
                HysteresisAction::Failed {
                    rule_id: recovery.id(),
                }
            }
        }
    }

    async fn trip(&self, rule: &CompiledRule) -> HysteresisAction {
        let recovery = recovery_rule_for(rule.row(), rule.op().flipped());
        let result = bounded(
            "create_rule",
            self.store_timeout,
            self.store.create_rule(&recovery),
        )
        .await;
        match result {
            Ok(created) => {
                tracing::info!(
                    rule_id = rule.id(),
                    recovery_id = created.id,
                    device_id = rule.device_id(),
                    compare_type = %created.compare_type,
                    "Threshold rule tripped; recovery rule created"
                );
                HysteresisAction::RecoveryCreated {
                    rule_id: rule.id(),
                    recovery_id: created.id,
                }
            }
            Err(e) => {
                tracing::error!(
                    rule_id = rule.id(),
                    error = %e,
                    "Failed to create recovery rule"
                );
                HysteresisAction::Failed { rule_id: rule.id() }
            }
        }
    }
}
