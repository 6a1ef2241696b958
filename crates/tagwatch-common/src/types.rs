use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device id used for messages whose source address is not in the directory.
pub const UNKNOWN_DEVICE_ID: i32 = -1;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use tagwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A monitored device as held by the device store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub device_type: String,
    /// Network address; unique across devices and used to attribute inbound messages.
    pub address: String,
    /// Ids of the people notified about this device's alerts.
    #[serde(default)]
    pub responsible: Vec<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Placeholder used by reports for messages whose device is unknown.
    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_DEVICE_ID,
            name: "unknown device".to_string(),
            device_type: "unknown device".to_string(),
            address: "unknown device".to_string(),
            responsible: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// Tag rule record as stored in the rule store.
///
/// Fields are kept in their stored (textual) form; the rule compiler turns
/// a row into an executable matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRuleRow {
    pub id: i32,
    pub name: String,
    pub device_id: i32,
    /// Regular expression run against the message body.
    pub pattern: String,
    /// One of `=`, `<`, `>`.
    pub compare_type: String,
    /// Operand compared against the captured value.
    pub value: String,
    /// Capture group supplying the compared value (0 = whole match).
    pub capture_index: i32,
    pub subject: String,
    pub severity: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Inbound telemetry/log message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Assigned by the message store; `0` until persisted.
    #[serde(default)]
    pub id: i64,
    pub device_id: i32,
    pub body: String,
    pub message_type: String,
    /// Overwritten by the winning rule's severity during classification.
    pub severity: Option<Severity>,
    pub component: String,
    pub received_at: DateTime<Utc>,
}
