use crate::error::Result;
use crate::{check_collection, DocumentStore, StoredDocument};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DOCUMENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection, id);
";

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) the database at `path`, creating parent directories
    /// as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(DOCUMENTS_SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened document store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn insert(&self, collection: &str, doc: &serde_json::Value) -> Result<String> {
        check_collection(collection)?;
        let body = serde_json::to_string(doc)?;
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO documents (collection, timestamp, body) VALUES (?1, ?2, ?3)",
            params![collection, Utc::now().timestamp_millis(), body],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }

    fn recent(&self, collection: &str, limit: usize) -> Result<Vec<StoredDocument>> {
        check_collection(collection)?;
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, timestamp, body FROM documents
             WHERE collection = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![collection, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, ts_ms, body) = row?;
            docs.push(StoredDocument {
                id: id.to_string(),
                collection: collection.to_string(),
                stored_at: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
                body: serde_json::from_str(&body)?,
            });
        }
        Ok(docs)
    }

    fn count(&self, collection: &str) -> Result<u64> {
        check_collection(collection)?;
        let conn = self.lock_conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn ping(&self) -> Result<()> {
        self.lock_conn().query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
