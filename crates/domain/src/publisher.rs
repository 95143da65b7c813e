//! Event publisher contract and in-process implementations.
//!
//! Publication is best effort. The order service calls the publisher only
//! after a write has committed and never lets a [`PublishError`] change the
//! outcome of the operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::OrderId;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};

use crate::event::DomainEvent;
use crate::order::{Order, OrderEvent, OrderStatus, Payment};

/// Errors a publisher may report.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Nobody is listening on the bus.
    #[error("No subscribers for {event_type}")]
    NoSubscribers { event_type: &'static str },

    /// The notification transport rejected the event.
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),
}

/// Sink for order events.
///
/// Implementations must be safe for concurrent dispatch. Delivery order
/// across different orders is not guaranteed.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a single event.
    async fn publish(&self, event: OrderEvent) -> Result<(), PublishError>;

    async fn publish_order_created(&self, order: &Order) -> Result<(), PublishError> {
        self.publish(OrderEvent::created(order)).await
    }

    async fn publish_order_status_changed(
        &self,
        order: &Order,
        previous_status: OrderStatus,
    ) -> Result<(), PublishError> {
        self.publish(OrderEvent::status_changed(order, previous_status))
            .await
    }

    async fn publish_inventory_reserved(&self, order: &Order) -> Result<(), PublishError> {
        self.publish(OrderEvent::inventory_reserved(order)).await
    }

    async fn publish_inventory_released(&self, order: &Order) -> Result<(), PublishError> {
        self.publish(OrderEvent::inventory_released(order)).await
    }

    async fn publish_payment_processed(
        &self,
        order: &Order,
        payment: &Payment,
    ) -> Result<(), PublishError> {
        self.publish(OrderEvent::payment_processed(order, payment))
            .await
    }

    async fn publish_tracking_added(
        &self,
        order: &Order,
        tracking_code: &str,
    ) -> Result<(), PublishError> {
        self.publish(OrderEvent::tracking_added(order, tracking_code))
            .await
    }
}

/// Publisher that records events in memory.
///
/// Cloning shares the recorded events. It can be switched into a failing
/// mode to exercise the best-effort path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    events: Arc<RwLock<Vec<OrderEvent>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a publisher that rejects every event.
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.set_failing(true);
        publisher
    }

    /// Makes subsequent `publish` calls fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns every recorded event in publication order.
    pub async fn events(&self) -> Vec<OrderEvent> {
        self.events.read().await.clone()
    }

    /// Returns the type names of the recorded events.
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events
            .read()
            .await
            .iter()
            .map(|event| event.event_type())
            .collect()
    }

    /// Returns the recorded events for one order.
    pub async fn events_for(&self, order_id: OrderId) -> Vec<OrderEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.order_id() == order_id)
            .cloned()
            .collect()
    }

    /// Returns the number of recorded events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all recorded events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: OrderEvent) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable(format!(
                "simulated failure publishing {}",
                event.event_type()
            )));
        }
        self.events.write().await.push(event);
        Ok(())
    }
}

/// Publisher backed by a tokio broadcast channel.
///
/// Inventory and notification consumers call [`subscribe`](Self::subscribe)
/// and each receive every event. A slow subscriber that falls more than
/// `capacity` events behind sees `RecvError::Lagged` and skips ahead.
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<OrderEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new consumer.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of live consumers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: OrderEvent) -> Result<(), PublishError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|broadcast::error::SendError(event)| PublishError::NoSubscribers {
                event_type: event.event_type(),
            })
    }
}
