//! Order lifecycle engine.
//!
//! This crate provides:
//! - The Order aggregate with its status state machine
//! - Domain events and the best-effort EventPublisher contract
//! - The OrderRepository contract over a version-checked document store
//! - OrderService, which runs every mutation as load → mutate → compare-and-swap
//! - OrderAdmin, the separate administrative interface

pub mod config;
pub mod error;
pub mod event;
pub mod order;
pub mod publisher;
pub mod repository;

pub use common::{OrderId, Permission, RequestContext, Role, UserId};
pub use config::{DispatchMode, ServiceConfig};
pub use error::{DomainError, ErrorKind};
pub use event::DomainEvent;
pub use order::{
    Address, CreateOrder, CreatePosOrder, InventoryData, InventoryLine, Money, Order, OrderAdmin,
    OrderCreatedData, OrderError, OrderEvent, OrderItem, OrderService, OrderSource,
    OrderStatus, OrderStatusChangedData, Payment, PaymentDetails, PaymentMethod,
    PaymentProcessedData, ProductId, QuickPosTransaction, TrackingAddedData,
};
pub use order_store::Version;
pub use publisher::{BroadcastEventPublisher, EventPublisher, InMemoryEventPublisher, PublishError};
pub use repository::{DocumentOrderRepository, OrderFilter, OrderRepository};
