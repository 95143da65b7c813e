use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    DocumentQuery, OrderDocument, OrderId, Result, StoreError, Version,
    store::{DocumentStore, validate_query, validate_replacement},
};

/// In-memory document store implementation for testing.
///
/// This implementation keeps every document in a map and provides the same
/// interface as the PostgreSQL implementation. The compare-and-swap runs
/// entirely under the write lock, so the version check and the replacement
/// cannot interleave with another writer.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<OrderId, OrderDocument>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, document: OrderDocument) -> Result<()> {
        let mut store = self.documents.write().await;

        if store.contains_key(&document.id) {
            return Err(StoreError::AlreadyExists(document.id));
        }

        store.insert(document.id, document);
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<OrderDocument>> {
        let store = self.documents.read().await;
        Ok(store.get(&id).cloned())
    }

    async fn compare_and_swap(&self, document: OrderDocument, expected: Version) -> Result<()> {
        validate_replacement(&document, expected)?;

        let mut store = self.documents.write().await;

        let stored = store
            .get_mut(&document.id)
            .ok_or(StoreError::NotFound(document.id))?;

        if stored.version != expected {
            return Err(StoreError::VersionConflict {
                order_id: document.id,
                expected,
                actual: stored.version,
            });
        }

        *stored = document;
        Ok(())
    }

    async fn delete(&self, id: OrderId) -> Result<bool> {
        let mut store = self.documents.write().await;
        Ok(store.remove(&id).is_some())
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<OrderDocument>> {
        validate_query(&query)?;

        let store = self.documents.read().await;
        let mut documents: Vec<_> = store
            .values()
            .filter(|document| query.matches(document))
            .cloned()
            .collect();

        // Sort by creation time then id
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0) as usize;
        let documents = documents.into_iter().skip(offset);

        let documents = if let Some(limit) = query.limit {
            documents.take(limit as usize).collect()
        } else {
            documents.collect()
        };

        Ok(documents)
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let store = self.documents.read().await;
        let count = store
            .values()
            .filter(|document| query.matches(document))
            .count();
        Ok(count as u64)
    }
}
