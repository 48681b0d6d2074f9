use thiserror::Error;

/// Errors reported by the embedded SQL engine.
///
/// Every variant is fatal to the call that produced it; nothing in this crate
/// retries.
#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A UNIQUE / NOT NULL / CHECK constraint rejected a write.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl SQLError {
    /// Classify a statement failure, separating constraint violations from
    /// other execution errors.
    pub(crate) fn execution(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => SQLError::Constraint(err.to_string()),
            _ => SQLError::Execution(err.to_string()),
        }
    }
}
