use crate::error::CompareError;
use crate::RECOVERY_SUBJECT;
use regex::Regex;
use std::str::FromStr;
use tagwatch_common::types::{Severity, TagRuleRow};

/// Comparison operator of a tag rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    LessThan,
    GreaterThan,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(Self::Equal),
            "<" => Ok(Self::LessThan),
            ">" => Ok(Self::GreaterThan),
            other => Err(format!("unknown compare type: {other}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::LessThan => write!(f, "<"),
            Self::GreaterThan => write!(f, ">"),
        }
    }
}

impl CompareOp {
    /// Threshold operators take part in hysteresis; `=` does not.
    pub fn is_threshold(self) -> bool {
        matches!(self, Self::LessThan | Self::GreaterThan)
    }

    /// The operator that fires once a threshold condition reverses.
    pub fn flipped(self) -> Self {
        match self {
            Self::LessThan => Self::GreaterThan,
            Self::GreaterThan => Self::LessThan,
            Self::Equal => Self::Equal,
        }
    }
}

/// Compiled comparison against a rule operand.
///
/// Numeric operands are parsed once at compile time; `threshold` is `None`
/// when the stored operand is not a number, in which case the comparison
/// never holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equal(String),
    LessThan {
        operand: String,
        threshold: Option<f64>,
    },
    GreaterThan {
        operand: String,
        threshold: Option<f64>,
    },
}

impl Comparison {
    pub fn new(op: CompareOp, operand: &str) -> Self {
        let threshold = operand.parse::<f64>().ok();
        match op {
            CompareOp::Equal => Self::Equal(operand.to_string()),
            CompareOp::LessThan => Self::LessThan {
                operand: operand.to_string(),
                threshold,
            },
            CompareOp::GreaterThan => Self::GreaterThan {
                operand: operand.to_string(),
                threshold,
            },
        }
    }

    pub fn op(&self) -> CompareOp {
        match self {
            Self::Equal(_) => CompareOp::Equal,
            Self::LessThan { .. } => CompareOp::LessThan,
            Self::GreaterThan { .. } => CompareOp::GreaterThan,
        }
    }

    pub fn operand(&self) -> &str {
        match self {
            Self::Equal(operand)
            | Self::LessThan { operand, .. }
            | Self::GreaterThan { operand, .. } => operand,
        }
    }

    /// Evaluates `extracted <op> operand`.
    pub fn holds(&self, extracted: &str) -> Result<bool, CompareError> {
        match self {
            Self::Equal(operand) => Ok(extracted == operand),
            Self::LessThan { operand, threshold } => {
                let (value, threshold) = numeric_pair(extracted, operand, *threshold)?;
                Ok(value < threshold)
            }
            Self::GreaterThan { operand, threshold } => {
                let (value, threshold) = numeric_pair(extracted, operand, *threshold)?;
                Ok(value > threshold)
            }
        }
    }
}

fn numeric_pair(
    extracted: &str,
    operand: &str,
    threshold: Option<f64>,
) -> Result<(f64, f64), CompareError> {
    let threshold = threshold.ok_or_else(|| CompareError::OperandNotNumeric(operand.to_string()))?;
    let value = extracted
        .parse::<f64>()
        .map_err(|_| CompareError::ValueNotNumeric(extracted.to_string()))?;
    Ok((value, threshold))
}

/// Executable form of a [`TagRuleRow`].
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub(crate) row: TagRuleRow,
    pub(crate) pattern: Regex,
    pub(crate) comparison: Comparison,
    pub(crate) capture_index: usize,
    pub(crate) severity: Severity,
}

impl CompiledRule {
    pub fn id(&self) -> i32 {
        self.row.id
    }

    pub fn device_id(&self) -> i32 {
        self.row.device_id
    }

    pub fn subject(&self) -> &str {
        &self.row.subject
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn op(&self) -> CompareOp {
        self.comparison.op()
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn capture_index(&self) -> usize {
        self.capture_index
    }

    /// The stored record this matcher was compiled from.
    pub fn row(&self) -> &TagRuleRow {
        &self.row
    }

    /// A `<`/`>` rule carrying the reserved recovery subject.
    pub fn is_recovery(&self) -> bool {
        self.op().is_threshold() && self.row.subject == RECOVERY_SUBJECT
    }

    /// Returns the text of the configured capture group, or `None` when the
    /// pattern does not match or the group does not participate in the match.
    pub fn capture<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(body)
            .and_then(|caps| caps.get(self.capture_index))
            .map(|m| m.as_str())
    }

    /// True when the pattern matches `body` and the comparison holds for the
    /// captured value.
    pub fn matches(&self, body: &str) -> bool {
        let Some(value) = self.capture(body) else {
            return false;
        };
        match self.comparison.holds(value) {
            Ok(holds) => holds,
            Err(e) => {
                tracing::warn!(rule_id = self.row.id, error = %e, "Comparison failed");
                false
            }
        }
    }

    /// Whether `other` is the recovery rule paired with this rule: same
    /// device, pattern, operand and capture index, flipped operator and the
    /// recovery subject.
    pub fn is_recovery_twin_of(&self, other: &TagRuleRow) -> bool {
        self.is_recovery()
            && self.row.device_id == other.device_id
            && self.row.pattern == other.pattern
            && self.row.value == other.value
            && self.row.capture_index == other.capture_index
            && other
                .compare_type
                .parse::<CompareOp>()
                .is_ok_and(|op| op.flipped() == self.op())
    }
}
