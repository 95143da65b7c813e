//! Domain error types.

use common::{OrderId, Permission, Role};
use order_store::{StoreError, Version};
use thiserror::Error;

use crate::order::OrderError;

/// Errors returned by order service operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The order aggregate rejected the request.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Another writer committed first. Reload and reissue.
    #[error("Version conflict for order {order_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// An order with this ID already exists.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The caller's role does not grant the permission the operation needs.
    #[error("Role {role} lacks permission {permission}")]
    Forbidden { role: Role, permission: Permission },

    /// The deadline expired while waiting on the repository.
    #[error("Operation timed out: {operation}")]
    Timeout { operation: &'static str },

    /// Any other storage failure.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => DomainError::NotFound(id),
            StoreError::AlreadyExists(id) => DomainError::AlreadyExists(id),
            StoreError::VersionConflict {
                order_id,
                expected,
                actual,
            } => DomainError::VersionConflict {
                order_id,
                expected,
                actual,
            },
            StoreError::Serialization(e) => DomainError::Serialization(e),
            other => DomainError::Store(other),
        }
    }
}

/// Coarse classification of a [`DomainError`], for callers that map errors
/// onto transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InvalidTransition,
    VersionConflict,
    AlreadyExists,
    Forbidden,
    Timeout,
    Internal,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Order(e) if e.is_invalid_input() => ErrorKind::InvalidInput,
            DomainError::Order(_) => ErrorKind::InvalidTransition,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::VersionConflict { .. } => ErrorKind::VersionConflict,
            DomainError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DomainError::Forbidden { .. } => ErrorKind::Forbidden,
            DomainError::Timeout { .. } => ErrorKind::Timeout,
            DomainError::Store(StoreError::InvalidQuery(_)) => ErrorKind::InvalidInput,
            DomainError::Store(_) | DomainError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if reloading the order and reissuing the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::VersionConflict | ErrorKind::Timeout
        )
    }
}
