use thiserror::Error;

/// Errors raised by a source provider.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested table does not exist in the source.
    #[error("Unknown source table: {0}")]
    UnknownTable(String),

    /// A group references tables the source cannot resolve.
    #[error("Invalid group '{group}': {reason}")]
    InvalidGroup { group: String, reason: String },

    /// The source database file could not be opened.
    #[error("Source database not found: {0}")]
    NotFound(String),

    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A blocking read task panicked or was cancelled.
    #[error("Source task failed: {0}")]
    Task(String),
}

/// Errors raised by a target store client.
///
/// The variants mirror the error classes a key-value service reports; the
/// batch writer decides which of them are retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TargetError {
    /// Request rate exceeded; the whole request may be retried later.
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// The service was temporarily unreachable.
    #[error("Target unavailable: {0}")]
    Unavailable(String),

    /// The request was malformed (oversized batch, bad item, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The caller is not allowed to perform the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The collection is busy with a lifecycle transition.
    #[error("Collection in use: {0}")]
    CollectionInUse(String),

    /// Local storage or encoding failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sled::Error> for TargetError {
    fn from(err: sled::Error) -> Self {
        TargetError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TargetError {
    fn from(err: serde_json::Error) -> Self {
        TargetError::Storage(format!("item encoding: {err}"))
    }
}
