//! Document storage for reporter output and alert records.
//!
//! Every document is a JSON object filed under a collection name. The default
//! implementation ([`sqlite::SqliteDocumentStore`]) keeps all collections in a
//! single SQLite database in WAL mode so readers are not blocked while a job
//! run writes. [`memory::MemoryDocumentStore`] keeps everything in process.

pub mod error;
pub mod memory;
pub mod sqlite;


use chrono::{DateTime, Utc};
pub use error::{Result, StorageError};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// A document as read back from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub collection: String,
    /// When the document was inserted.
    pub stored_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

/// Persistence backend for report and alert documents.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait DocumentStore: Send + Sync {
    /// Inserts `doc` into `collection` and returns the new document's id.
    fn insert(&self, collection: &str, doc: &serde_json::Value) -> Result<String>;

    /// Returns up to `limit` documents of `collection`, newest first.
    fn recent(&self, collection: &str, limit: usize) -> Result<Vec<StoredDocument>>;

    /// Number of documents in `collection`.
    fn count(&self, collection: &str) -> Result<u64>;

    /// Checks that the backend answers queries.
    fn ping(&self) -> Result<()>;
}

fn check_collection(collection: &str) -> Result<()> {
    if collection.trim().is_empty() {
        return Err(StorageError::InvalidCollection(collection.to_string()));
    }
    Ok(())
}
