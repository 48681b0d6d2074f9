use history_sql::SQLError;
use thiserror::Error;

/// Stable error code constants.
///
/// Front ends should match on these rather than on message text.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INSUFFICIENT_HISTORY: &str = "INSUFFICIENT_HISTORY";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const SERIALIZATION: &str = "SERIALIZATION";
    pub const NOT_IMPLEMENTED: &str = "NOT_IMPLEMENTED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

#[derive(Error, Debug)]
pub enum HistoryError {
    /// The key is not live, or has no stored version at all.
    #[error("not found: {0}")]
    NotFound(String),

    /// Fewer versions are stored than the requested depth reaches back.
    #[error("there are only {available} values in history (requested depth {depth})")]
    InsufficientHistory { available: u64, depth: i64 },

    /// Negative depth, or the reserved registry key used through the public surface.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value could not be encoded, or a stored blob could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The embedded engine failed. Never retried.
    #[error(transparent)]
    Storage(#[from] SQLError),
}

impl HistoryError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            HistoryError::NotFound(_) => error_code::NOT_FOUND,
            HistoryError::InsufficientHistory { .. } => error_code::INSUFFICIENT_HISTORY,
            HistoryError::InvalidArgument(_) => error_code::INVALID_ARGUMENT,
            HistoryError::Serialization(_) => error_code::SERIALIZATION,
            HistoryError::NotImplemented(_) => error_code::NOT_IMPLEMENTED,
            HistoryError::Storage(_) => error_code::STORAGE_ERROR,
        }
    }
}
