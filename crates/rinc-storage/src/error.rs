/// Errors that can occur within the document store.
///
/// # Examples
///
/// ```rust
/// use rinc_storage::error::StorageError;
///
/// let err = StorageError::InvalidCollection("".to_string());
/// assert!(err.to_string().contains("collection"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Collection names must be non-empty.
    #[error("Storage: invalid collection name {0:?}")]
    InvalidCollection(String),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization of a document body.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The database directory could not be created.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
