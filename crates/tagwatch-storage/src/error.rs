/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use tagwatch_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "tag_rule",
///     id: "42".to_string(),
/// };
/// assert!(err.to_string().contains("tag_rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A unique key is already taken (e.g. a device address).
    #[error("Storage: {entity} already exists ({key})")]
    Duplicate { entity: &'static str, key: String },

    /// The backing store is unreachable or failed the request.
    #[error("Storage: backend unavailable: {0}")]
    Unavailable(String),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
