use crate::cache::RuleCache;
use crate::directory::DeviceDirectory;
use crate::error::Result;
use crate::hysteresis::{HysteresisAction, HysteresisManager};
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::Message;
use tagwatch_storage::{DeviceStore, RuleStore};

/// Result of evaluating one message against its device's rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub notify: bool,
    pub subject: String,
    pub text: String,
    /// The message, with severity overwritten by the winning rule.
    pub message: Message,
    /// Id of the winning rule.
    pub rule_id: Option<i32>,
    /// Rule-store transition triggered by a winning `<`/`>` rule.
    pub hysteresis: Option<HysteresisAction>,
}

impl Classification {
    fn no_match(message: Message) -> Self {
        Self {
            notify: false,
            subject: String::new(),
            text: String::new(),
            message,
            rule_id: None,
            hysteresis: None,
        }
    }
}

/// Classifies inbound messages against per-device tag rules.
///
/// Owns the rule cache and device directory. Callers invoke
/// [`refresh_rules`](Self::refresh_rules) / [`refresh_devices`](Self::refresh_devices)
/// after mutating the backing stores.
pub struct Classifier {
    rules: Arc<RuleCache>,
    devices: Arc<DeviceDirectory>,
    rule_store: Arc<dyn RuleStore>,
    device_store: Arc<dyn DeviceStore>,
    hysteresis: HysteresisManager,
    store_timeout: Duration,
}

impl Classifier {
    pub fn new(
        rule_store: Arc<dyn RuleStore>,
        device_store: Arc<dyn DeviceStore>,
        store_timeout: Duration,
    ) -> Self {
        let rules = Arc::new(RuleCache::new());
        let hysteresis = HysteresisManager::new(rule_store.clone(), rules.clone(), store_timeout);
        Self {
            rules,
            devices: Arc::new(DeviceDirectory::new()),
            rule_store,
            device_store,
            hysteresis,
            store_timeout,
        }
    }

    pub fn rules(&self) -> &Arc<RuleCache> {
        &self.rules
    }

    pub fn devices(&self) -> &Arc<DeviceDirectory> {
        &self.devices
    }

    /// Reloads the rule cache from the rule store. Returns the number of active rules.
    pub async fn refresh_rules(&self) -> Result<usize> {
        self.rules
            .refresh(self.rule_store.as_ref(), self.store_timeout)
            .await
    }

    /// Reloads the device directory from the device store. Returns the number of devices.
    pub async fn refresh_devices(&self) -> Result<usize> {
        self.devices
            .refresh(self.device_store.as_ref(), self.store_timeout)
            .await
    }

    /// Evaluates the device's rules in load order; the first rule whose
    /// pattern matches and whose comparison holds wins.
    ///
    /// A device without rules, or a message no rule matches, yields
    /// `notify == false` and the message unchanged.
    pub async fn classify(&self, mut message: Message) -> Result<Classification> {
        let snapshot = self.rules.snapshot();
        let Some(rule) = snapshot
            .rules_for(message.device_id)
            .iter()
            .find(|rule| rule.matches(&message.body))
            .cloned()
        else {
            tracing::debug!(device_id = message.device_id, "No rule matched");
            return Ok(Classification::no_match(message));
        };
        drop(snapshot);

        message.severity = Some(rule.severity());
        tracing::debug!(
            device_id = message.device_id,
            rule_id = rule.id(),
            subject = %rule.subject(),
            "Rule matched"
        );

        let hysteresis = if rule.op().is_threshold() {
            Some(self.hysteresis.on_threshold_fired(&rule).await)
        } else {
            None
        };

        Ok(Classification {
            notify: true,
            subject: rule.subject().to_string(),
            text: message.body.clone(),
            message,
            rule_id: Some(rule.id()),
            hysteresis,
        })
    }
}
