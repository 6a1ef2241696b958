use crate::compiler::{compile_rule, compile_rules};
use crate::error::{CompareError, CompileError, EngineError};
use crate::matcher::{CompareOp, Comparison};
use crate::{Classifier, DeviceDirectory, HysteresisAction, HysteresisManager, RECOVERY_SUBJECT};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tagwatch_common::types::{Device, Message, Severity, TagRuleRow};
use tagwatch_storage::{
    DeviceStore, MemoryStore, Result as StoreResult, RuleStore, StorageError, TagRuleUpdate,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn make_rule(
    device_id: i32,
    pattern: &str,
    op: &str,
    value: &str,
    capture_index: i32,
    subject: &str,
    severity: &str,
) -> TagRuleRow {
    TagRuleRow {
        id: 0,
        name: format!("{subject} on {device_id}"),
        device_id,
        pattern: pattern.to_string(),
        compare_type: op.to_string(),
        value: value.to_string(),
        capture_index,
        subject: subject.to_string(),
        severity: severity.to_string(),
        created_at: None,
        updated_at: None,
    }
}

fn high_temp_rule(device_id: i32) -> TagRuleRow {
    make_rule(device_id, r"temp=(\d+)", ">", "80", 1, "HIGH_TEMP", "critical")
}

fn make_message(device_id: i32, body: &str) -> Message {
    Message {
        id: 0,
        device_id,
        body: body.to_string(),
        message_type: "telemetry".to_string(),
        severity: None,
        component: "sensor".to_string(),
        received_at: Utc::now(),
    }
}

fn make_device(id: i32, address: &str) -> Device {
    Device {
        id,
        name: format!("device-{id}"),
        device_type: "router".to_string(),
        address: address.to_string(),
        responsible: vec![7],
        created_at: None,
        updated_at: None,
    }
}

async fn setup(rows: &[TagRuleRow]) -> (Arc<MemoryStore>, Classifier) {
    let store = Arc::new(MemoryStore::new());
    for row in rows {
        store.create_rule(row).await.unwrap();
    }
    let classifier = Classifier::new(store.clone(), store.clone(), TIMEOUT);
    classifier.refresh_rules().await.unwrap();
    (store, classifier)
}

/// Rule state without store-assigned ids and timestamps.
fn rule_state(rows: &[TagRuleRow]) -> Vec<(i32, String, String, String, i32, String, String)> {
    rows.iter()
        .map(|r| {
            (
                r.device_id,
                r.pattern.clone(),
                r.compare_type.clone(),
                r.value.clone(),
                r.capture_index,
                r.subject.clone(),
                r.severity.clone(),
            )
        })
        .collect()
}

// ---- Compiler ----

#[test]
fn compile_accepts_all_operators() {
    for op in ["=", "<", ">"] {
        let rule = compile_rule(&make_rule(1, r"v=(\w+)", op, "1", 1, "S", "warning")).unwrap();
        assert_eq!(rule.op().to_string(), op);
        assert_eq!(rule.severity(), Severity::Warning);
    }
}

#[test]
fn compile_rejects_invalid_rows() {
    let bad_pattern = make_rule(1, r"temp=(\d+", ">", "80", 1, "S", "critical");
    assert!(matches!(
        compile_rule(&bad_pattern),
        Err(CompileError::InvalidPattern(_))
    ));

    let bad_op = make_rule(1, r"temp=(\d+)", ">=", "80", 1, "S", "critical");
    assert!(matches!(
        compile_rule(&bad_op),
        Err(CompileError::UnknownOperator(op)) if op == ">="
    ));

    let bad_index = make_rule(1, r"temp=(\d+)", ">", "80", -1, "S", "critical");
    assert!(matches!(
        compile_rule(&bad_index),
        Err(CompileError::NegativeCaptureIndex(-1))
    ));

    let bad_severity = make_rule(1, r"temp=(\d+)", ">", "80", 1, "S", "panic");
    assert!(matches!(
        compile_rule(&bad_severity),
        Err(CompileError::UnknownSeverity(_))
    ));
}

#[test]
fn compile_rules_skips_broken_rows_and_keeps_order() {
    let mut rows = vec![
        make_rule(1, r"a=(\d+)", ">", "1", 1, "first", "info"),
        make_rule(1, r"b=(\d+", ">", "1", 1, "broken", "info"),
        make_rule(1, r"c=(\d+)", "~", "1", 1, "unknown-op", "info"),
        make_rule(1, r"d=(\d+)", "<", "1", 1, "last", "info"),
    ];
    for (i, row) in rows.iter_mut().enumerate() {
        row.id = i as i32 + 1;
    }

    let compiled = compile_rules(&rows);
    let subjects: Vec<&str> = compiled.iter().map(|r| r.subject()).collect();
    assert_eq!(subjects, vec!["first", "last"]);
}

#[test]
fn non_numeric_operand_compiles_but_never_holds() {
    let rule = compile_rule(&make_rule(1, r"temp=(\d+)", ">", "hot", 1, "S", "critical")).unwrap();
    assert!(!rule.matches("temp=95"));
    assert_eq!(
        rule.comparison().holds("95"),
        Err(CompareError::OperandNotNumeric("hot".to_string()))
    );
}

// ---- Comparison ----

#[test]
fn compare_op_parse_display_and_flip() {
    assert_eq!("<".parse::<CompareOp>().unwrap(), CompareOp::LessThan);
    assert_eq!(" > ".parse::<CompareOp>().unwrap(), CompareOp::GreaterThan);
    assert!("!=".parse::<CompareOp>().is_err());

    assert_eq!(CompareOp::GreaterThan.flipped(), CompareOp::LessThan);
    assert_eq!(CompareOp::LessThan.flipped(), CompareOp::GreaterThan);
    assert_eq!(CompareOp::Equal.flipped(), CompareOp::Equal);
    assert!(!CompareOp::Equal.is_threshold());
}

#[test]
fn comparison_evaluates_each_operator() {
    let eq = Comparison::new(CompareOp::Equal, "up");
    assert_eq!(eq.holds("up"), Ok(true));
    assert_eq!(eq.holds("down"), Ok(false));

    let gt = Comparison::new(CompareOp::GreaterThan, "80");
    assert_eq!(gt.holds("80.5"), Ok(true));
    assert_eq!(gt.holds("80"), Ok(false));

    let lt = Comparison::new(CompareOp::LessThan, "-1.5");
    assert_eq!(lt.holds("-2"), Ok(true));
    assert_eq!(lt.operand(), "-1.5");
}

#[test]
fn comparison_reports_non_numeric_value() {
    let gt = Comparison::new(CompareOp::GreaterThan, "80");
    assert_eq!(
        gt.holds("n/a"),
        Err(CompareError::ValueNotNumeric("n/a".to_string()))
    );
}

#[test]
fn capture_index_out_of_bounds_is_no_match() {
    let rule = compile_rule(&make_rule(1, r"temp=(\d+)", "=", "95", 3, "S", "info")).unwrap();
    assert_eq!(rule.capture(r"temp=95"), None);
    assert!(!rule.matches("temp=95"));
}

#[test]
fn capture_index_zero_uses_whole_match() {
    let rule = compile_rule(&make_rule(1, r"link (down|up)", "=", "link down", 0, "S", "info"))
        .unwrap();
    assert!(rule.matches("eth0: link down"));
}

// ---- Classifier ----

#[tokio::test]
async fn threshold_rule_fires_and_creates_recovery_rule() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;

    let outcome = classifier.classify(make_message(1, "temp=95")).await.unwrap();
    assert!(outcome.notify);
    assert_eq!(outcome.subject, "HIGH_TEMP");
    assert_eq!(outcome.text, "temp=95");
    assert_eq!(outcome.message.severity, Some(Severity::Critical));
    assert!(matches!(
        outcome.hysteresis,
        Some(HysteresisAction::RecoveryCreated { rule_id: 1, .. })
    ));

    let rules = store.list_rules().await.unwrap();
    assert_eq!(rules.len(), 2);
    let recovery = &rules[1];
    assert_eq!(recovery.compare_type, "<");
    assert_eq!(recovery.value, "80");
    assert_eq!(recovery.pattern, r"temp=(\d+)");
    assert_eq!(recovery.capture_index, 1);
    assert_eq!(recovery.subject, RECOVERY_SUBJECT);
    assert_eq!(recovery.severity, "info");

    // The cache already reflects the new rule.
    assert_eq!(classifier.rules().snapshot().rules_for(1).len(), 2);
}

#[tokio::test]
async fn device_without_rules_is_not_notified() {
    let (_store, classifier) = setup(&[high_temp_rule(1)]).await;

    let message = make_message(2, "temp=95");
    let outcome = classifier.classify(message.clone()).await.unwrap();
    assert!(!outcome.notify);
    assert!(outcome.subject.is_empty());
    assert!(outcome.text.is_empty());
    assert_eq!(outcome.message, message);
    assert_eq!(outcome.rule_id, None);
}

#[tokio::test]
async fn recovery_rule_fires_and_is_deleted() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;
    classifier.classify(make_message(1, "temp=95")).await.unwrap();

    let outcome = classifier.classify(make_message(1, "temp=70")).await.unwrap();
    assert!(outcome.notify);
    assert_eq!(outcome.subject, RECOVERY_SUBJECT);
    assert_eq!(outcome.message.severity, Some(Severity::Info));
    assert!(matches!(
        outcome.hysteresis,
        Some(HysteresisAction::RecoveryDeleted { .. })
    ));

    let rules = store.list_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].subject, "HIGH_TEMP");
    assert_eq!(classifier.rules().snapshot().rules_for(1).len(), 1);
}

#[tokio::test]
async fn hysteresis_cycles_reproduce_the_same_state() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;
    let armed = rule_state(&store.list_rules().await.unwrap());

    let mut tripped_states = Vec::new();
    for _ in 0..2 {
        classifier.classify(make_message(1, "temp=95")).await.unwrap();
        tripped_states.push(rule_state(&store.list_rules().await.unwrap()));

        classifier.classify(make_message(1, "temp=70")).await.unwrap();
        assert_eq!(rule_state(&store.list_rules().await.unwrap()), armed);
    }
    assert_eq!(tripped_states[0], tripped_states[1]);
}

#[tokio::test]
async fn repeated_alert_while_tripped_does_not_duplicate_recovery() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;
    classifier.classify(make_message(1, "temp=95")).await.unwrap();

    let outcome = classifier.classify(make_message(1, "temp=97")).await.unwrap();
    assert!(outcome.notify);
    assert_eq!(outcome.subject, "HIGH_TEMP");
    assert!(matches!(
        outcome.hysteresis,
        Some(HysteresisAction::RecoveryExists { rule_id: 1, .. })
    ));
    assert_eq!(store.rule_count().await, 2);
}

#[tokio::test]
async fn less_than_rule_gets_greater_than_recovery() {
    let rule = make_rule(1, r"battery=(\d+)%", "<", "20", 1, "LOW_BATTERY", "warning");
    let (store, classifier) = setup(&[rule]).await;

    let outcome = classifier.classify(make_message(1, "battery=15%")).await.unwrap();
    assert_eq!(outcome.subject, "LOW_BATTERY");

    let rules = store.list_rules().await.unwrap();
    assert_eq!(rules[1].compare_type, ">");
    assert_eq!(rules[1].subject, RECOVERY_SUBJECT);

    let outcome = classifier.classify(make_message(1, "battery=80%")).await.unwrap();
    assert_eq!(outcome.subject, RECOVERY_SUBJECT);
    assert_eq!(store.rule_count().await, 1);
}

#[tokio::test]
async fn equality_rules_never_touch_the_rule_store() {
    let rules = [
        make_rule(1, r"state=(\w+)", "=", "down", 1, "LINK_DOWN", "error"),
        make_rule(1, r"state=(\w+)", "=", "up", 1, RECOVERY_SUBJECT, "info"),
    ];
    let (store, classifier) = setup(&rules).await;
    let before = store.list_rules().await.unwrap();

    for body in ["state=down", "state=up", "state=down", "state=flapping", "garbage"] {
        let outcome = classifier.classify(make_message(1, body)).await.unwrap();
        assert!(outcome.hysteresis.is_none());
    }

    assert_eq!(store.list_rules().await.unwrap(), before);
}

#[tokio::test]
async fn first_matching_rule_wins() {
    let rules = [
        make_rule(1, r"error (\w+)", "=", "disk", 1, "DISK", "critical"),
        make_rule(1, r"error (\w+)", "=", "disk", 1, "DISK_AGAIN", "warning"),
    ];
    let (_store, classifier) = setup(&rules).await;

    let outcome = classifier.classify(make_message(1, "error disk")).await.unwrap();
    assert_eq!(outcome.subject, "DISK");
    assert_eq!(outcome.message.severity, Some(Severity::Critical));
}

#[tokio::test]
async fn pattern_match_with_false_condition_falls_through() {
    let rules = [
        make_rule(1, r"temp=(\d+)", ">", "100", 1, "OVERHEAT", "critical"),
        make_rule(1, r"temp=(\d+)", "=", "95", 1, "EXACT", "warning"),
    ];
    let (store, classifier) = setup(&rules).await;

    let outcome = classifier.classify(make_message(1, "temp=95")).await.unwrap();
    assert_eq!(outcome.subject, "EXACT");
    assert!(outcome.hysteresis.is_none());
    assert_eq!(store.rule_count().await, 2);
}

#[tokio::test]
async fn unmatched_message_keeps_its_severity() {
    let (_store, classifier) = setup(&[high_temp_rule(1)]).await;
    let mut message = make_message(1, "humidity=40");
    message.severity = Some(Severity::Warning);

    let outcome = classifier.classify(message).await.unwrap();
    assert!(!outcome.notify);
    assert_eq!(outcome.message.severity, Some(Severity::Warning));
}

#[tokio::test]
async fn broken_rule_is_never_selected() {
    let rules = [
        make_rule(1, r"temp=(\d+", ">", "0", 1, "BROKEN", "critical"),
        make_rule(1, r"temp=(\d+)", "~", "0", 1, "UNKNOWN_OP", "critical"),
        make_rule(1, r"temp=(\d+)", "=", "95", 1, "VALID", "info"),
    ];
    let (_store, classifier) = setup(&rules).await;
    assert_eq!(classifier.rules().snapshot().len(), 1);

    for body in ["temp=95", "temp=1", "temp=(", ""] {
        let outcome = classifier.classify(make_message(1, body)).await.unwrap();
        assert_ne!(outcome.subject, "BROKEN");
        assert_ne!(outcome.subject, "UNKNOWN_OP");
    }
}

#[tokio::test]
async fn refresh_picks_up_store_changes() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;
    store
        .update_rule(
            1,
            &TagRuleUpdate {
                value: Some("99".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Stale until refreshed.
    let outcome = classifier.classify(make_message(1, "temp=90")).await.unwrap();
    assert!(outcome.notify);
    classifier.classify(make_message(1, "temp=10")).await.unwrap();

    classifier.refresh_rules().await.unwrap();
    let outcome = classifier.classify(make_message(1, "temp=90")).await.unwrap();
    assert!(!outcome.notify);
}

// ---- Failure handling ----

/// Rule store wrapper with switchable failures and latency.
#[derive(Default)]
struct FlakyRuleStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicUsize,
}

#[async_trait]
impl RuleStore for FlakyRuleStore {
    async fn list_rules(&self) -> StoreResult<Vec<TagRuleRow>> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("connection refused".into()));
        }
        self.inner.list_rules().await
    }

    async fn create_rule(&self, rule: &TagRuleRow) -> StoreResult<TagRuleRow> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("read-only replica".into()));
        }
        self.inner.create_rule(rule).await
    }

    async fn update_rule(&self, id: i32, update: &TagRuleUpdate) -> StoreResult<TagRuleRow> {
        self.inner.update_rule(id, update).await
    }

    async fn delete_rule(&self, id: i32) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("read-only replica".into()));
        }
        self.inner.delete_rule(id).await
    }
}

async fn flaky_setup(rows: &[TagRuleRow], timeout: Duration) -> (Arc<FlakyRuleStore>, Classifier) {
    let store = Arc::new(FlakyRuleStore::default());
    for row in rows {
        store.inner.create_rule(row).await.unwrap();
    }
    let devices = Arc::new(MemoryStore::new());
    let classifier = Classifier::new(store.clone(), devices, timeout);
    classifier.refresh_rules().await.unwrap();
    (store, classifier)
}

#[tokio::test]
async fn hysteresis_store_failure_does_not_fail_classification() {
    let (store, classifier) = flaky_setup(&[high_temp_rule(1)], TIMEOUT).await;
    store.fail_writes.store(true, Ordering::SeqCst);

    let outcome = classifier.classify(make_message(1, "temp=95")).await.unwrap();
    assert!(outcome.notify);
    assert_eq!(outcome.subject, "HIGH_TEMP");
    assert_eq!(outcome.hysteresis, Some(HysteresisAction::Failed { rule_id: 1 }));
    assert_eq!(store.inner.rule_count().await, 1);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let (store, classifier) = flaky_setup(&[high_temp_rule(1)], TIMEOUT).await;
    let generation = classifier.rules().generation();
    store.fail_reads.store(true, Ordering::SeqCst);

    let err = classifier.refresh_rules().await.unwrap_err();
    assert!(matches!(err, EngineError::Store { operation: "list_rules", .. }));
    assert_eq!(classifier.rules().generation(), generation);
    assert_eq!(classifier.rules().snapshot().len(), 1);
}

#[tokio::test]
async fn timed_out_refresh_keeps_previous_snapshot() {
    let (store, classifier) =
        flaky_setup(&[high_temp_rule(1)], Duration::from_millis(20)).await;
    store.inner.create_rule(&high_temp_rule(2)).await.unwrap();
    store.read_delay_ms.store(2_000, Ordering::SeqCst);

    let err = classifier.refresh_rules().await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { .. }));
    assert_eq!(classifier.rules().snapshot().len(), 1);
    assert!(classifier.rules().lookup(2).is_none());
}

#[tokio::test]
async fn recovery_rule_already_deleted_is_tolerated() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;
    classifier.classify(make_message(1, "temp=95")).await.unwrap();

    // Another path removes the recovery rule; the cache is still stale.
    let recovery_id = store.list_rules().await.unwrap()[1].id;
    store.delete_rule(recovery_id).await.unwrap();

    let outcome = classifier.classify(make_message(1, "temp=60")).await.unwrap();
    assert_eq!(outcome.subject, RECOVERY_SUBJECT);
    assert_eq!(
        outcome.hysteresis,
        Some(HysteresisAction::RecoveryDeleted { recovery_id })
    );
    assert_eq!(classifier.rules().snapshot().rules_for(1).len(), 1);
}

#[tokio::test]
async fn duplicate_recovery_rules_are_each_deleted_once() {
    let (store, classifier) = setup(&[high_temp_rule(1)]).await;
    let armed = store.list_rules().await.unwrap();
    let cache = classifier.rules().clone();
    let manager = HysteresisManager::new(store.clone(), cache.clone(), TIMEOUT);
    let alerting = cache.snapshot().rules_for(1)[0].clone();

    // Two trips that both read the pre-trip snapshot.
    for _ in 0..2 {
        assert_eq!(cache.replace(&armed), 1);
        let action = manager.on_threshold_fired(&alerting).await;
        assert!(matches!(action, HysteresisAction::RecoveryCreated { rule_id: 1, .. }));
    }
    assert_eq!(store.rule_count().await, 3);
    assert_eq!(cache.snapshot().len(), 3);
    assert_eq!(cache.snapshot().device_count(), 1);

    let mut deleted = Vec::new();
    for _ in 0..2 {
        let outcome = classifier.classify(make_message(1, "temp=70")).await.unwrap();
        assert_eq!(outcome.subject, RECOVERY_SUBJECT);
        match outcome.hysteresis {
            Some(HysteresisAction::RecoveryDeleted { recovery_id }) => deleted.push(recovery_id),
            other => panic!("unexpected hysteresis action: {other:?}"),
        }
    }
    assert_eq!(deleted, vec![2, 3]);

    let remaining = store.list_rules().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 1);
    assert_eq!(rule_state(&remaining), rule_state(&armed));

    let outcome = classifier.classify(make_message(1, "temp=70")).await.unwrap();
    assert!(!outcome.notify);
    assert!(outcome.hysteresis.is_none());
}

// ---- Concurrency ----

/// Alternates between two complete rule sets on every read.
struct AlternatingRuleStore {
    reads: AtomicUsize,
}

impl AlternatingRuleStore {
    fn rule_set(subject: &str) -> Vec<TagRuleRow> {
        (1..=3)
            .map(|i| TagRuleRow {
                id: i,
                ..make_rule(1, r"(x)", "=", "x", 1, subject, "info")
            })
            .collect()
    }
}

#[async_trait]
impl RuleStore for AlternatingRuleStore {
    async fn list_rules(&self) -> StoreResult<Vec<TagRuleRow>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Self::rule_set(if n % 2 == 0 { "A" } else { "B" }))
    }

    async fn create_rule(&self, _rule: &TagRuleRow) -> StoreResult<TagRuleRow> {
        Err(StorageError::Other("read only".into()))
    }

    async fn update_rule(&self, _id: i32, _update: &TagRuleUpdate) -> StoreResult<TagRuleRow> {
        Err(StorageError::Other("read only".into()))
    }

    async fn delete_rule(&self, _id: i32) -> StoreResult<()> {
        Err(StorageError::Other("read only".into()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_partial_rule_set() {
    let store = Arc::new(AlternatingRuleStore {
        reads: AtomicUsize::new(0),
    });
    let classifier = Arc::new(Classifier::new(
        store,
        Arc::new(MemoryStore::new()),
        TIMEOUT,
    ));
    classifier.refresh_rules().await.unwrap();

    let refresher = {
        let classifier = classifier.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                classifier.refresh_rules().await.unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let classifier = classifier.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                let snapshot = classifier.rules().snapshot();
                let rules = snapshot.rules_for(1);
                assert_eq!(rules.len(), 3);
                assert!(rules.iter().all(|r| r.subject() == rules[0].subject()));

                let outcome = classifier.classify(make_message(1, "x")).await.unwrap();
                assert!(outcome.notify);
                assert!(outcome.subject == "A" || outcome.subject == "B");
                tokio::task::yield_now().await;
            }
        }));
    }

    refresher.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

// ---- Device directory ----

#[tokio::test]
async fn device_directory_indexes_by_id_and_address() {
    let store = MemoryStore::new();
    let directory = DeviceDirectory::new();
    assert_eq!(directory.device_id_by_address("10.0.0.1"), None);

    let created = store.create_device(&make_device(0, "10.0.0.1")).await.unwrap();
    store.create_device(&make_device(0, "10.0.0.2")).await.unwrap();

    let count = directory.refresh(&store, TIMEOUT).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(directory.device_id_by_address("10.0.0.1"), Some(created.id));
    assert_eq!(directory.lookup(created.id).unwrap().address, "10.0.0.1");
    assert!(directory.lookup_address("10.0.0.3").is_none());

    let mut addresses = directory.addresses();
    addresses.sort();
    assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2"]);
}

#[test]
fn device_directory_replace_drops_missing_devices() {
    let directory = DeviceDirectory::new();
    directory.replace(vec![make_device(1, "10.0.0.1"), make_device(2, "10.0.0.2")]);
    directory.replace(vec![make_device(2, "10.0.0.2")]);

    assert!(directory.lookup(1).is_none());
    assert!(directory.lookup_address("10.0.0.1").is_none());
    assert_eq!(directory.device_id_by_address("10.0.0.2"), Some(2));
    assert_eq!(directory.generation(), 2);
}
