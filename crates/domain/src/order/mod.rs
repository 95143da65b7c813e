//! Order aggregate and related types.

mod admin;
mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use admin::OrderAdmin;
pub use aggregate::Order;
pub use commands::{CreateOrder, CreatePosOrder, PaymentDetails, QuickPosTransaction};
pub use events::{
    InventoryData, InventoryLine, OrderCreatedData, OrderEvent, OrderStatusChangedData,
    PaymentProcessedData, TrackingAddedData,
};
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::{
    Address, Money, OrderItem, OrderSource, Payment, PaymentMethod, ProductId,
};

use thiserror::Error;

/// Errors raised by the order aggregate itself, before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The owning user ID is required.
    #[error("User ID is required")]
    UserIdRequired,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Invalid price.
    #[error("Invalid price for {product_id}: {price} (must be greater than 0)")]
    InvalidPrice { product_id: String, price: i64 },

    /// Point-of-sale orders need the till location.
    #[error("Location ID is required for point-of-sale orders")]
    LocationIdRequired,

    /// Point-of-sale orders need the staff member.
    #[error("Staff ID is required for point-of-sale orders")]
    StaffIdRequired,

    /// Payments must be positive.
    #[error("Invalid payment amount: {amount} (must be greater than 0)")]
    InvalidPaymentAmount { amount: i64 },

    /// A line total, the order total or the amount paid would exceed the
    /// representable range.
    #[error("Amount exceeds the representable range")]
    AmountOverflow,

    /// Payments need a processor reference.
    #[error("Transaction ID is required")]
    TransactionIdRequired,

    /// Tracking codes must not be blank.
    #[error("Tracking code must not be empty")]
    EmptyTrackingCode,

    /// The requested status is not reachable from the current one.
    #[error("Invalid transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order is cancelled and can no longer change.
    #[error("Order is cancelled")]
    OrderCancelled,

    /// A status name that does not exist.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

impl OrderError {
    /// Returns true for errors caused by malformed caller input, as opposed
    /// to a request the current order state does not allow.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(
            self,
            OrderError::InvalidTransition { .. } | OrderError::OrderCancelled
        )
    }
}
