use crate::error::Result;
use crate::{check_collection, DocumentStore, StoredDocument};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

/// In-process store. Ids count up from 1 across all collections.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<Vec<StoredDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_docs(&self) -> MutexGuard<'_, Vec<StoredDocument>> {
        self.docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every document of `collection` in insertion order.
    pub fn all(&self, collection: &str) -> Vec<StoredDocument> {
        self.lock_docs()
            .iter()
            .filter(|d| d.collection == collection)
            .cloned()
            .collect()
    }

    /// Collection names in insertion order, one entry per document.
    pub fn insertion_order(&self) -> Vec<String> {
        self.lock_docs().iter().map(|d| d.collection.clone()).collect()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn insert(&self, collection: &str, doc: &serde_json::Value) -> Result<String> {
        check_collection(collection)?;
        let mut docs = self.lock_docs();
        let id = (docs.len() + 1).to_string();
        docs.push(StoredDocument {
            id: id.clone(),
            collection: collection.to_string(),
            stored_at: Utc::now(),
            body: doc.clone(),
        });
        Ok(id)
    }

    fn recent(&self, collection: &str, limit: usize) -> Result<Vec<StoredDocument>> {
        check_collection(collection)?;
        Ok(self
            .lock_docs()
            .iter()
            .rev()
            .filter(|d| d.collection == collection)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count(&self, collection: &str) -> Result<u64> {
        check_collection(collection)?;
        Ok(self
            .lock_docs()
            .iter()
            .filter(|d| d.collection == collection)
            .count() as u64)
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }
}
