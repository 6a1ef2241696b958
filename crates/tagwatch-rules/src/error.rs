use std::time::Duration;
use tagwatch_storage::StorageError;

/// Reasons a stored rule cannot be turned into a matcher. A rule that fails
/// to compile is left out of the active set.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("unknown compare type '{0}' (expected '=', '<' or '>')")]
    UnknownOperator(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("capture index must not be negative (got {0})")]
    NegativeCaptureIndex(i32),

    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),
}

/// Failure to evaluate a numeric comparison. Treated as "condition false".
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("captured value '{0}' is not a number")]
    ValueNotNumeric(String),

    #[error("rule operand '{0}' is not a number")]
    OperandNotNumeric(String),
}

/// Errors surfaced by refresh operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error during {operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("{operation} did not complete within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Runs a store call bounded by `limit`. Dropping the returned future, or
/// running out of time, abandons the call without side effects on the caches.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: std::future::Future<Output = tagwatch_storage::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(EngineError::Store { operation, source }),
        Err(_) => Err(EngineError::Timeout {
            operation,
            timeout: limit,
        }),
    }
}
