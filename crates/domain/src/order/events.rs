//! Order domain events.
//!
//! Events are published after a write commits. They carry a snapshot of the
//! fields downstream consumers need so nobody has to read the order back.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use order_store::Version;
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::{Money, Order, OrderItem, OrderSource, OrderStatus, Payment, ProductId};

/// Events emitted by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed.
    OrderCreated(OrderCreatedData),

    /// Order moved between lifecycle statuses.
    OrderStatusChanged(OrderStatusChangedData),

    /// Stock should be held for the order's lines.
    InventoryReserved(InventoryData),

    /// Stock held for a cancelled order should be returned.
    InventoryReleased(InventoryData),

    /// A payment was recorded.
    PaymentProcessed(PaymentProcessedData),

    /// A carrier tracking code was attached.
    OrderTrackingAdded(TrackingAddedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            OrderEvent::InventoryReserved(_) => "InventoryReserved",
            OrderEvent::InventoryReleased(_) => "InventoryReleased",
            OrderEvent::PaymentProcessed(_) => "PaymentProcessed",
            OrderEvent::OrderTrackingAdded(_) => "OrderTrackingAdded",
        }
    }
}

// Event creation helpers
impl OrderEvent {
    pub fn created(order: &Order) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id: order.id(),
            user_id: order.user_id().clone(),
            source: order.source().clone(),
            items: order.items().to_vec(),
            total_amount: order.total_amount(),
            created_at: order.created_at(),
        })
    }

    pub fn status_changed(order: &Order, previous_status: OrderStatus) -> Self {
        OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            order_id: order.id(),
            user_id: order.user_id().clone(),
            previous_status,
            new_status: order.status(),
            version: order.version(),
            changed_at: order.updated_at(),
        })
    }

    pub fn inventory_reserved(order: &Order) -> Self {
        OrderEvent::InventoryReserved(InventoryData::from_order(order))
    }

    pub fn inventory_released(order: &Order) -> Self {
        OrderEvent::InventoryReleased(InventoryData::from_order(order))
    }

    pub fn payment_processed(order: &Order, payment: &Payment) -> Self {
        OrderEvent::PaymentProcessed(PaymentProcessedData {
            order_id: order.id(),
            user_id: order.user_id().clone(),
            payment: payment.clone(),
            amount_paid: order.amount_paid(),
            total_amount: order.total_amount(),
        })
    }

    pub fn tracking_added(order: &Order, tracking_code: impl Into<String>) -> Self {
        OrderEvent::OrderTrackingAdded(TrackingAddedData {
            order_id: order.id(),
            user_id: order.user_id().clone(),
            tracking_code: tracking_code.into(),
            status: order.status(),
            version: order.version(),
            added_at: order.updated_at(),
        })
    }

    /// Returns the order this event is about.
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated(data) => data.order_id,
            OrderEvent::OrderStatusChanged(data) => data.order_id,
            OrderEvent::InventoryReserved(data) | OrderEvent::InventoryReleased(data) => {
                data.order_id
            }
            OrderEvent::PaymentProcessed(data) => data.order_id,
            OrderEvent::OrderTrackingAdded(data) => data.order_id,
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub source: OrderSource,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// Data for OrderStatusChanged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,

    /// Version the change was committed at.
    pub version: Version,

    pub changed_at: DateTime<Utc>,
}

/// A stock movement for one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLine {
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
}

/// Data for InventoryReserved and InventoryReleased events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryData {
    pub order_id: OrderId,
    pub lines: Vec<InventoryLine>,

    /// Store location for point-of-sale orders; `None` ships from the warehouse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

impl InventoryData {
    fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            lines: order
                .items()
                .iter()
                .map(|item| InventoryLine {
                    product_id: item.product_id.clone(),
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                })
                .collect(),
            location_id: order.source().location_id().map(str::to_string),
        }
    }
}

/// Data for PaymentProcessed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProcessedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment: Payment,

    /// Sum of all payments after this one.
    pub amount_paid: Money,

    pub total_amount: Money,
}

/// Data for OrderTrackingAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingAddedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub tracking_code: String,

    /// Status at the time the code was added (unchanged by it).
    pub status: OrderStatus,

    pub version: Version,
    pub added_at: DateTime<Utc>,
}
