use async_trait::async_trait;

use crate::{DocumentQuery, OrderDocument, OrderId, Result, StoreError, Version};

/// Storage driver contract for order documents.
///
/// All implementations must be thread-safe (Send + Sync). The one hard
/// requirement is that [`DocumentStore::compare_and_swap`] checks the stored
/// version and replaces the document as a single indivisible step.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document without any version check.
    ///
    /// Fails with `AlreadyExists` if a document with the same ID is stored.
    async fn insert(&self, document: OrderDocument) -> Result<()>;

    /// Retrieves a document by ID.
    ///
    /// Returns None if the document doesn't exist.
    async fn get(&self, id: OrderId) -> Result<Option<OrderDocument>>;

    /// Replaces a stored document if its version still equals `expected`.
    ///
    /// Fails with `NotFound` if the document doesn't exist and with
    /// `VersionConflict` if another writer committed first. A rejected write
    /// leaves the stored document untouched.
    async fn compare_and_swap(&self, document: OrderDocument, expected: Version) -> Result<()>;

    /// Removes a document without any version check.
    ///
    /// Returns true if a document was removed.
    async fn delete(&self, id: OrderId) -> Result<bool>;

    /// Retrieves documents matching a query, oldest first.
    async fn query(&self, query: DocumentQuery) -> Result<Vec<OrderDocument>>;

    /// Counts documents matching a query's filters.
    async fn count(&self, query: DocumentQuery) -> Result<u64>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Retrieves a document, failing with `NotFound` if it doesn't exist.
    async fn get_existing(&self, id: OrderId) -> Result<OrderDocument> {
        self.get(id).await?.ok_or(StoreError::NotFound(id))
    }

    /// Checks if a document exists.
    async fn exists(&self, id: OrderId) -> Result<bool> {
        Ok(self.get(id).await?.is_some())
    }

    /// Returns the stored version of a document, if any.
    async fn current_version(&self, id: OrderId) -> Result<Option<Version>> {
        Ok(self.get(id).await?.map(|document| document.version))
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Checks the paging parameters of a query before it reaches a driver.
pub fn validate_query(query: &DocumentQuery) -> Result<()> {
    if let Some(limit) = query.limit
        && limit < 0
    {
        return Err(StoreError::InvalidQuery(format!(
            "limit must not be negative, got {limit}"
        )));
    }
    if let Some(offset) = query.offset
        && offset < 0
    {
        return Err(StoreError::InvalidQuery(format!(
            "offset must not be negative, got {offset}"
        )));
    }
    Ok(())
}

/// Checks that a replacement document advances the version by exactly one.
pub fn validate_replacement(document: &OrderDocument, expected: Version) -> Result<()> {
    if document.version != expected.next() {
        return Err(StoreError::InvalidQuery(format!(
            "replacement for order {} must carry version {}, got {}",
            document.id,
            expected.next(),
            document.version
        )));
    }
    Ok(())
}
