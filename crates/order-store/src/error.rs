use thiserror::Error;

use crate::{OrderId, Version};

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this ID is already stored.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The order was not found in the store.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The stored version did not match the version the writer last read.
    #[error("Version conflict for order {order_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The query cannot be executed as given.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
