use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub collection: String,
    pub content: String,
}

/// Append-only in-memory document store, keyed by collection name.
///
/// Clones share the same storage. Entries are never mutated or removed, so
/// readers always observe a consistent prefix of the insertions.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Arc<RwLock<Vec<StoredDocument>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store shared by harnesses that are not given their own.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<DocumentStore> = OnceLock::new();
        GLOBAL.get_or_init(DocumentStore::new).clone()
    }

    /// Append `documents` to `collection`. Ids are `"{collection}_{n}"` where
    /// `n` is the store-wide insertion sequence number.
    pub fn add_documents<I, S>(&self, collection: &str, documents: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let mut ids = Vec::new();
        for content in documents {
            let id = format!("{collection}_{}", docs.len());
            docs.push(StoredDocument {
                id: id.clone(),
                collection: collection.to_string(),
                content: content.into(),
            });
            ids.push(id);
        }
        tracing::debug!(collection, added = ids.len(), total = docs.len(), "documents added");
        ids
    }

    /// Snapshot of the stored contents, in insertion order, optionally
    /// restricted to one collection.
    pub fn documents(&self, collection: Option<&str>) -> Vec<String> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.iter()
            .filter(|d| collection.map_or(true, |c| d.collection == c))
            .map(|d| d.content.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<StoredDocument> {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
