/// Errors that can occur within the storage layer.
///
/// # Migration note
///
/// The `PollStore` trait currently returns `anyhow::Result` so callers can
/// attach context freely. This module defines the target error type; new
/// internal code should return `error::Result<T>` where possible.
///
/// # Examples
///
/// ```rust
/// use oxpoll_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "poll_job",
///     id: 42,
/// };
/// assert!(err.to_string().contains("poll_job"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: i64 },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (credentials and
    /// result columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
