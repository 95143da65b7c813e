//! Order repository contract over typed orders.
//!
//! [`DocumentOrderRepository`] adapts any [`DocumentStore`] by serializing
//! the aggregate into the document body and mirroring the indexed columns.

use async_trait::async_trait;
use common::{OrderId, UserId};
use order_store::{DocumentQuery, DocumentStore, OrderDocument, Version};

use crate::error::DomainError;
use crate::order::{Order, OrderStatus};

/// Filter for listing and counting orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            status: None,
        }
    }

    pub fn for_status(status: OrderStatus) -> Self {
        Self {
            user_id: None,
            status: Some(status),
        }
    }

    fn into_query(self) -> DocumentQuery {
        DocumentQuery {
            owner_id: self.user_id,
            status: self.status.map(|status| status.as_str().to_string()),
            limit: None,
            offset: None,
        }
    }
}

/// Durable storage for orders.
///
/// `update_with_optimistic_lock` is the only serialization point between
/// concurrent writers: it must check the stored version and replace the
/// order as one indivisible step.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order without any version check.
    async fn create(&self, order: &Order) -> Result<(), DomainError>;

    /// Loads an order, failing with `NotFound` if it doesn't exist.
    async fn get_by_id(&self, id: OrderId) -> Result<Order, DomainError>;

    /// Replaces the stored order if its version still equals `expected`.
    async fn update_with_optimistic_lock(
        &self,
        order: &Order,
        expected: Version,
    ) -> Result<(), DomainError>;

    /// Removes an order without any version check.
    async fn delete(&self, id: OrderId) -> Result<bool, DomainError>;

    /// Lists matching orders, oldest first.
    async fn list(
        &self,
        filter: OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, DomainError>;

    /// Counts matching orders.
    async fn count(&self, filter: OrderFilter) -> Result<u64, DomainError>;
}

/// [`OrderRepository`] backed by a [`DocumentStore`].
#[derive(Debug, Clone, Default)]
pub struct DocumentOrderRepository<S> {
    store: S,
}

impl<S: DocumentStore> DocumentOrderRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

fn to_document(order: &Order) -> Result<OrderDocument, DomainError> {
    Ok(OrderDocument {
        id: order.id(),
        owner_id: order.user_id().clone(),
        status: order.status().as_str().to_string(),
        version: order.version(),
        created_at: order.created_at(),
        updated_at: order.updated_at(),
        body: serde_json::to_value(order)?,
    })
}

fn from_document(document: OrderDocument) -> Result<Order, DomainError> {
    Ok(serde_json::from_value(document.body)?)
}

#[async_trait]
impl<S: DocumentStore> OrderRepository for DocumentOrderRepository<S> {
    async fn create(&self, order: &Order) -> Result<(), DomainError> {
        self.store.insert(to_document(order)?).await?;
        Ok(())
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Order, DomainError> {
        let document = self.store.get(id).await?.ok_or(DomainError::NotFound(id))?;
        from_document(document)
    }

    async fn update_with_optimistic_lock(
        &self,
        order: &Order,
        expected: Version,
    ) -> Result<(), DomainError> {
        self.store
            .compare_and_swap(to_document(order)?, expected)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: OrderId) -> Result<bool, DomainError> {
        Ok(self.store.delete(id).await?)
    }

    async fn list(
        &self,
        filter: OrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, DomainError> {
        let query = filter.into_query().limit(limit).offset(offset);
        self.store
            .query(query)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn count(&self, filter: OrderFilter) -> Result<u64, DomainError> {
        Ok(self.store.count(filter.into_query()).await?)
    }
}
