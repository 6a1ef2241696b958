use crate::error::CompileError;
use crate::matcher::{CompareOp, Comparison, CompiledRule};
use regex::Regex;
use tagwatch_common::types::{Severity, TagRuleRow};

// ---- Stored row -> compiled matcher ----

/// Compiles a single [`TagRuleRow`] into a [`CompiledRule`].
///
/// The pattern is compiled once here and reused for every message.
pub fn compile_rule(row: &TagRuleRow) -> Result<CompiledRule, CompileError> {
    let op: CompareOp = row
        .compare_type
        .parse()
        .map_err(|_: String| CompileError::UnknownOperator(row.compare_type.clone()))?;
    let pattern = Regex::new(&row.pattern)?;
    let capture_index = usize::try_from(row.capture_index)
        .map_err(|_| CompileError::NegativeCaptureIndex(row.capture_index))?;
    let severity: Severity = row
        .severity
        .parse()
        .map_err(|_: String| CompileError::UnknownSeverity(row.severity.clone()))?;

    let comparison = Comparison::new(op, &row.value);
    if op.is_threshold() && row.value.parse::<f64>().is_err() {
        tracing::warn!(
            rule_id = row.id,
            operand = %row.value,
            "Threshold operand is not numeric; rule will never fire"
        );
    }

    Ok(CompiledRule {
        row: row.clone(),
        pattern,
        comparison,
        capture_index,
        severity,
    })
}

/// Compiles rows in order, skipping invalid ones with warnings.
pub fn compile_rules(rows: &[TagRuleRow]) -> Vec<CompiledRule> {
    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        match compile_rule(row) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                tracing::warn!(
                    rule_id = row.id,
                    rule_name = %row.name,
                    device_id = row.device_id,
                    error = %e,
                    "Skipping invalid tag rule"
                );
            }
        }
    }
    rules
}
