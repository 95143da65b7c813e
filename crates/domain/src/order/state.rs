//! Order state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► Paid ──► Processing ──► Shipped ──► Delivered
///    │         │           │
///    └─────────┴───────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed, nothing paid yet.
    #[default]
    Created,

    /// Payment has been confirmed.
    Paid,

    /// Order is being picked and packed.
    Processing,

    /// Order has been handed to the carrier.
    Shipped,

    /// Order reached the customer (terminal state).
    Delivered,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns every status in lifecycle order.
    pub fn all() -> [OrderStatus; 6] {
        [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ]
    }

    /// Returns true if `next` is reachable from this status in one step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Created, Paid)
                | (Paid, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Created | Paid | Processing, Cancelled)
        )
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "Created",
            OrderStatus::Paid => "Paid",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::all()
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}
