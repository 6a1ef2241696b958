use tagwatch_rules::{CompileError, EngineError};

/// Errors returned by the ingestion and administration services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid rule: {0}")]
    InvalidRule(#[from] CompileError),

    #[error("subject '{subject}' is reserved for recovery rules on '<'/'>' rules")]
    ReservedSubject { subject: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },
}

pub type Result<T> = std::result::Result<T, ServiceError>;
