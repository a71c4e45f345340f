//! Error types for the event store

use thiserror::Error;

/// Top-level error type for event store operations
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

/// Caller-visible validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Attribute keys may not start with the reserved prefix '_': {0}")]
    ReservedAttributeKey(String),

    #[error("Unrecognized reserved key: {0}")]
    UnknownReservedKey(String),

    #[error("Event source is missing or blank")]
    MissingSource,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Limit must be larger than 0, got {0}")]
    InvalidLimit(usize),

    #[error("Key part may not contain the key separator: {0:?}")]
    InvalidKey(String),
}

/// Errors raised by an ordered store backend
///
/// The engine never retries; these propagate to the caller as-is.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Corrupted row {row}: {reason}")]
    Corrupted { row: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StorageError {
    /// Create a new Backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create a new Corrupted error for a row
    pub fn corrupted(row: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            row: row.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Errors related to query dispatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Operation '{operation}' is not supported by the {strategy} index")]
    Unsupported {
        strategy: &'static str,
        operation: String,
    },
}

/// Result type alias for event store operations
pub type EventStoreResult<T> = Result<T, EventStoreError>;
