//! Order service: the only component that reads, modifies and writes orders.
//!
//! Every mutation is one load → mutate → conditional-write cycle. The write
//! expects the version that was loaded, so the repository's compare-and-swap
//! is the sole serialization point between concurrent callers. Conflicts are
//! returned as-is and never retried here. Events are published after the
//! write commits and their failures are only logged.

use std::future::Future;
use std::sync::Arc;

use common::{OrderId, Permission, RequestContext, UserId, deadline_after};
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::{DispatchMode, ServiceConfig};
use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::publisher::EventPublisher;
use crate::repository::{OrderFilter, OrderRepository};

use super::{
    CreateOrder, CreatePosOrder, Order, OrderAdmin, OrderError, OrderEvent, OrderSource,
    OrderStatus, PaymentDetails, QuickPosTransaction,
};

/// Which permission an operation on an existing order needs.
#[derive(Debug, Clone, Copy)]
enum Access {
    /// A flat permission, checked before the order is loaded.
    Any(Permission),

    /// `any` regardless of owner, or `own` when the caller owns the order.
    /// Checked after the load.
    OwnOrAny { own: Permission, any: Permission },
}

/// Service for managing orders.
///
/// Generic over the repository and the publisher so tests can wire in
/// in-memory implementations. The service holds no per-order state; each
/// call works on its own freshly loaded copy.
pub struct OrderService<R, P> {
    repository: R,
    publisher: Arc<P>,
    config: ServiceConfig,
}

impl<R, P> OrderService<R, P>
where
    R: OrderRepository,
    P: EventPublisher + 'static,
{
    /// Creates a new order service with default configuration.
    pub fn new(repository: R, publisher: P) -> Self {
        Self::with_config(repository, publisher, ServiceConfig::default())
    }

    pub fn with_config(repository: R, publisher: P, config: ServiceConfig) -> Self {
        Self {
            repository,
            publisher: Arc::new(publisher),
            config,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns a reference to the event publisher.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Opens the administrative interface. Requires `ManageOrders`.
    pub fn admin<'a>(
        &'a self,
        ctx: &'a RequestContext,
    ) -> Result<OrderAdmin<'a, R, P>, DomainError> {
        require(ctx, Permission::ManageOrders)?;
        Ok(OrderAdmin::new(self, ctx))
    }

    /// Places a web order.
    ///
    /// Publishes `OrderCreated` and `InventoryReserved`.
    #[tracing::instrument(skip(self, ctx, cmd), fields(user_id = %cmd.user_id, role = %ctx.role))]
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        cmd: CreateOrder,
    ) -> Result<Order, DomainError> {
        let start = std::time::Instant::now();
        authorize_create(ctx, &cmd.user_id)?;
        let order = Order::place(OrderId::new(), cmd, OrderSource::Web)?;

        self.insert(ctx, &order, "create_order").await?;
        record_duration("create_order", start);
        self.dispatch(vec![
            OrderEvent::created(&order),
            OrderEvent::inventory_reserved(&order),
        ])
        .await;
        Ok(order)
    }

    /// Places a point-of-sale order.
    ///
    /// Same persistence and events as [`create_order`](Self::create_order).
    #[tracing::instrument(
        skip(self, ctx, cmd),
        fields(user_id = %cmd.order.user_id, location_id = %cmd.location_id, role = %ctx.role)
    )]
    pub async fn create_pos_order(
        &self,
        ctx: &RequestContext,
        cmd: CreatePosOrder,
    ) -> Result<Order, DomainError> {
        let start = std::time::Instant::now();
        authorize_create(ctx, &cmd.order.user_id)?;
        require(ctx, Permission::CreatePosOrder)?;
        let order = place_pos(cmd)?;

        self.insert(ctx, &order, "create_pos_order").await?;
        record_duration("create_pos_order", start);
        self.dispatch(vec![
            OrderEvent::created(&order),
            OrderEvent::inventory_reserved(&order),
        ])
        .await;
        Ok(order)
    }

    /// Creates a point-of-sale order, then records its payment.
    ///
    /// Two writes: an insert, then a version-checked update. The payment is
    /// validated before the first write, so bad payment input persists
    /// nothing. The status stays `Created`.
    #[tracing::instrument(
        skip(self, ctx, txn),
        fields(
            user_id = %txn.order.order.user_id,
            location_id = %txn.order.location_id,
            role = %ctx.role
        )
    )]
    pub async fn process_quick_pos_transaction(
        &self,
        ctx: &RequestContext,
        txn: QuickPosTransaction,
    ) -> Result<Order, DomainError> {
        let start = std::time::Instant::now();
        let QuickPosTransaction { order: cmd, payment } = txn;
        authorize_create(ctx, &cmd.order.user_id)?;
        require(ctx, Permission::CreatePosOrder)?;
        require(ctx, Permission::RecordPayment)?;

        let created = place_pos(cmd)?;
        let mut paid = created.clone();
        let recorded = paid
            .add_payment(payment.method, payment.transaction_id, payment.amount)?
            .clone();

        self.insert(ctx, &created, "process_quick_pos_transaction").await?;
        self.dispatch(vec![
            OrderEvent::created(&created),
            OrderEvent::inventory_reserved(&created),
        ])
        .await;

        self.write(ctx, &paid, "process_quick_pos_transaction")
            .await?;
        record_mutation("process_quick_pos_transaction", start);

        self.dispatch(vec![OrderEvent::payment_processed(&paid, &recorded)])
            .await;
        Ok(paid)
    }

    /// Loads an order the caller may read.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn get_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let deadline = self.deadline(ctx);
        let order = bounded(deadline, "get_order", self.repository.get_by_id(order_id)).await?;
        require_on(
            ctx,
            order.user_id(),
            Permission::ReadOwnOrders,
            Permission::ReadAnyOrder,
        )?;
        Ok(order)
    }

    /// Lists a user's orders, oldest first.
    ///
    /// `limit <= 0` falls back to the configured page size. `offset` is
    /// passed to the store as given.
    #[tracing::instrument(skip(self, ctx), fields(caller = %ctx.user_id))]
    pub async fn get_user_orders(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, DomainError> {
        require_on(
            ctx,
            user_id,
            Permission::ReadOwnOrders,
            Permission::ReadAnyOrder,
        )?;
        let deadline = self.deadline(ctx);
        bounded(
            deadline,
            "get_user_orders",
            self.repository.list(
                OrderFilter::for_user(user_id.clone()),
                self.page_size(limit),
                offset,
            ),
        )
        .await
    }

    /// Moves an order to `new_status`.
    ///
    /// Publishes `OrderStatusChanged`, plus `InventoryReleased` when the
    /// new status is `Cancelled`.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn update_order_status(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, DomainError> {
        self.mutate(
            ctx,
            order_id,
            "update_order_status",
            Access::Any(Permission::UpdateStatus),
            move |order| {
                let previous = order.update_status(new_status)?;
                let mut events = vec![OrderEvent::status_changed(order, previous)];
                if new_status == OrderStatus::Cancelled {
                    events.push(OrderEvent::inventory_released(order));
                }
                Ok(events)
            },
        )
        .await
    }

    /// Records a payment. The status is left alone.
    ///
    /// Publishes `PaymentProcessed`.
    #[tracing::instrument(
        skip(self, ctx, payment),
        fields(user_id = %ctx.user_id, amount = %payment.amount)
    )]
    pub async fn add_payment_to_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        payment: PaymentDetails,
    ) -> Result<Order, DomainError> {
        self.mutate(
            ctx,
            order_id,
            "add_payment_to_order",
            Access::Any(Permission::RecordPayment),
            move |order| {
                let recorded = order
                    .add_payment(payment.method, payment.transaction_id, payment.amount)?
                    .clone();
                Ok(vec![OrderEvent::payment_processed(order, &recorded)])
            },
        )
        .await
    }

    /// Attaches a carrier tracking code.
    ///
    /// Publishes `OrderTrackingAdded`.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn add_tracking_code_to_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        code: &str,
    ) -> Result<Order, DomainError> {
        let code = code.to_string();
        self.mutate(
            ctx,
            order_id,
            "add_tracking_code_to_order",
            Access::Any(Permission::AddTracking),
            move |order| {
                order.add_tracking_code(&code)?;
                Ok(vec![OrderEvent::tracking_added(order, code.trim())])
            },
        )
        .await
    }

    /// Cancels an order.
    ///
    /// Publishes `OrderStatusChanged` and `InventoryReleased`.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn cancel_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        self.mutate(
            ctx,
            order_id,
            "cancel_order",
            Access::OwnOrAny {
                own: Permission::CancelOwnOrder,
                any: Permission::CancelAnyOrder,
            },
            |order| {
                let previous = order.cancel()?;
                Ok(vec![
                    OrderEvent::status_changed(order, previous),
                    OrderEvent::inventory_released(order),
                ])
            },
        )
        .await
    }

    /// Runs one load → mutate → conditional-write cycle.
    ///
    /// `mutation` must bump the version exactly once on success and returns
    /// the events to publish after the write commits.
    async fn mutate<F>(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        operation: &'static str,
        access: Access,
        mutation: F,
    ) -> Result<Order, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<Vec<OrderEvent>, OrderError> + Send,
    {
        let start = std::time::Instant::now();
        if let Access::Any(permission) = access {
            require(ctx, permission)?;
        }

        let deadline = self.deadline(ctx);
        let mut order = bounded(deadline, operation, self.repository.get_by_id(order_id)).await?;
        if let Access::OwnOrAny { own, any } = access {
            require_on(ctx, order.user_id(), own, any)?;
        }

        let events = mutation(&mut order)?;
        self.write(ctx, &order, operation).await?;
        record_mutation(operation, start);

        self.dispatch(events).await;
        Ok(order)
    }

    /// Inserts a new order under the caller's deadline.
    async fn insert(
        &self,
        ctx: &RequestContext,
        order: &Order,
        operation: &'static str,
    ) -> Result<(), DomainError> {
        let deadline = self.deadline(ctx);
        bounded(deadline, operation, self.repository.create(order)).await?;

        let source = if order.source().is_point_of_sale() {
            "point_of_sale"
        } else {
            "web"
        };
        metrics::counter!("orders_created_total", "source" => source).increment(1);
        tracing::debug!(order_id = %order.id(), version = %order.version(), "order created");
        Ok(())
    }

    /// Persists a mutated order, expecting the stored version to be the one
    /// it was loaded at.
    pub(crate) async fn write(
        &self,
        ctx: &RequestContext,
        order: &Order,
        operation: &'static str,
    ) -> Result<(), DomainError> {
        let expected = order.version().previous();
        let deadline = self.deadline(ctx);
        let result = bounded(
            deadline,
            operation,
            self.repository.update_with_optimistic_lock(order, expected),
        )
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    order_id = %order.id(),
                    version = %order.version(),
                    status = %order.status(),
                    "order committed"
                );
                Ok(())
            }
            Err(e @ DomainError::VersionConflict { .. }) => {
                metrics::counter!("order_version_conflicts_total", "operation" => operation)
                    .increment(1);
                tracing::info!(
                    order_id = %order.id(),
                    expected_version = %expected,
                    "version conflict"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Hands committed events to the publisher according to the dispatch mode.
    async fn dispatch(&self, events: Vec<OrderEvent>) {
        match self.config.dispatch {
            DispatchMode::Inline => publish_all(self.publisher.as_ref(), events).await,
            DispatchMode::Detached => {
                let publisher = Arc::clone(&self.publisher);
                tokio::spawn(
                    async move { publish_all(publisher.as_ref(), events).await }
                        .instrument(tracing::Span::current()),
                );
            }
        }
    }

    pub(crate) fn deadline(&self, ctx: &RequestContext) -> Instant {
        ctx.deadline
            .unwrap_or_else(|| deadline_after(self.config.operation_timeout))
    }

    pub(crate) fn page_size(&self, limit: i64) -> i64 {
        if limit <= 0 {
            self.config.default_page_size
        } else {
            limit
        }
    }
}

/// Publishes events one by one, absorbing failures.
async fn publish_all<P: EventPublisher + ?Sized>(publisher: &P, events: Vec<OrderEvent>) {
    for event in events {
        let event_type = event.event_type();
        let order_id = event.order_id();
        if let Err(error) = publisher.publish(event).await {
            metrics::counter!("order_event_publish_failures_total", "event_type" => event_type)
                .increment(1);
            tracing::warn!(%order_id, event_type, %error, "event publication failed");
        }
    }
}

/// Runs a repository call until `deadline`, mapping expiry to `Timeout`.
pub(crate) async fn bounded<T>(
    deadline: Instant,
    operation: &'static str,
    call: impl Future<Output = Result<T, DomainError>>,
) -> Result<T, DomainError> {
    match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, "repository call abandoned at deadline");
            Err(DomainError::Timeout { operation })
        }
    }
}

pub(crate) fn require(ctx: &RequestContext, permission: Permission) -> Result<(), DomainError> {
    if ctx.can(permission) {
        return Ok(());
    }
    Err(DomainError::Forbidden {
        role: ctx.role,
        permission,
    })
}

fn require_on(
    ctx: &RequestContext,
    owner: &UserId,
    own: Permission,
    any: Permission,
) -> Result<(), DomainError> {
    if ctx.can_act_on(owner, own, any) {
        return Ok(());
    }
    let missing = if ctx.can(own) { any } else { own };
    Err(DomainError::Forbidden {
        role: ctx.role,
        permission: missing,
    })
}

fn authorize_create(ctx: &RequestContext, user_id: &UserId) -> Result<(), DomainError> {
    require_on(
        ctx,
        user_id,
        Permission::CreateOwnOrder,
        Permission::CreateAnyOrder,
    )
}

fn place_pos(cmd: CreatePosOrder) -> Result<Order, OrderError> {
    let source = OrderSource::PointOfSale {
        location_id: cmd.location_id,
        staff_id: cmd.staff_id,
    };
    Order::place(OrderId::new(), cmd.order, source)
}

fn record_mutation(operation: &'static str, start: std::time::Instant) {
    metrics::counter!("order_mutations_total", "operation" => operation).increment(1);
    record_duration(operation, start);
}

fn record_duration(operation: &'static str, start: std::time::Instant) {
    metrics::histogram!("order_operation_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::error::ErrorKind;
    use crate::order::{Address, Money, OrderItem, PaymentMethod};
    use crate::publisher::InMemoryEventPublisher;
    use crate::repository::DocumentOrderRepository;
    use order_store::{InMemoryDocumentStore, Version};

    type TestService =
        OrderService<DocumentOrderRepository<InMemoryDocumentStore>, InMemoryEventPublisher>;

    fn service() -> TestService {
        OrderService::new(
            DocumentOrderRepository::new(InMemoryDocumentStore::new()),
            InMemoryEventPublisher::new(),
        )
    }

    fn address() -> Address {
        Address::new("1 Main St", "Springfield", "IL", "62701", "US")
    }

    fn cmd(user: &str) -> CreateOrder {
        CreateOrder::shipped_to(
            user,
            vec![OrderItem::new("PROD-001", "SKU-001", 2, Money::from_cents(1000))],
            address(),
        )
    }

    fn staff() -> RequestContext {
        RequestContext::staff("clerk-7")
    }

    #[tokio::test]
    async fn test_create_order_persists_and_publishes() {
        let service = service();
        let ctx = RequestContext::customer("alice");

        let order = service.create_order(&ctx, cmd("alice")).await.unwrap();

        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.version(), Version::first());
        let stored = service.repository().get_by_id(order.id()).await.unwrap();
        assert_eq!(stored, order);
        assert_eq!(
            service.publisher().event_types().await,
            vec!["OrderCreated", "InventoryReserved"]
        );
    }

    #[tokio::test]
    async fn test_customer_cannot_create_for_someone_else() {
        let service = service();
        let ctx = RequestContext::customer("alice");

        let result = service.create_order(&ctx, cmd("bob")).await;
        assert!(matches!(
            result,
            Err(DomainError::Forbidden {
                permission: Permission::CreateAnyOrder,
                ..
            })
        ));
        assert_eq!(service.publisher().event_count().await, 0);
    }

    #[tokio::test]
    async fn test_staff_creates_on_behalf_of_customer() {
        let service = service();
        let order = service.create_order(&staff(), cmd("bob")).await.unwrap();
        assert_eq!(order.user_id().as_str(), "bob");
    }

    #[tokio::test]
    async fn test_create_pos_order_requires_pos_permission() {
        let service = service();
        let customer = RequestContext::customer("alice");

        let result = service
            .create_pos_order(&customer, cmd("alice").at_point_of_sale("store-12", "clerk-7"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Forbidden {
                permission: Permission::CreatePosOrder,
                ..
            })
        ));

        let order = service
            .create_pos_order(&staff(), cmd("alice").at_point_of_sale("store-12", "clerk-7"))
            .await
            .unwrap();
        assert_eq!(order.source().location_id(), Some("store-12"));
    }

    #[tokio::test]
    async fn test_create_pos_order_requires_location() {
        let service = service();
        let result = service
            .create_pos_order(&staff(), cmd("alice").at_point_of_sale("", "clerk-7"))
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::LocationIdRequired))
        ));
        assert_eq!(
            service.repository().count(OrderFilter::new()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_quick_pos_transaction_two_writes() {
        let service = service();
        let txn = cmd("alice")
            .at_point_of_sale("store-12", "clerk-7")
            .paid_with(PaymentDetails::new(
                PaymentMethod::Cash,
                "till-42",
                Money::from_cents(2000),
            ));

        let order = service
            .process_quick_pos_transaction(&staff(), txn)
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.version(), Version::new(2));
        assert_eq!(order.amount_paid().cents(), 2000);

        let stored = service.repository().get_by_id(order.id()).await.unwrap();
        assert_eq!(stored.payments().len(), 1);
        assert_eq!(stored.version(), Version::new(2));
        assert_eq!(
            service.publisher().event_types().await,
            vec!["OrderCreated", "InventoryReserved", "PaymentProcessed"]
        );
    }

    #[tokio::test]
    async fn test_quick_pos_transaction_bad_payment_persists_nothing() {
        let service = service();
        let txn = cmd("alice")
            .at_point_of_sale("store-12", "clerk-7")
            .paid_with(PaymentDetails::new(
                PaymentMethod::Card,
                "txn-1",
                Money::zero(),
            ));

        let result = service.process_quick_pos_transaction(&staff(), txn).await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidPaymentAmount { amount: 0 }))
        ));
        assert_eq!(
            service.repository().count(OrderFilter::new()).await.unwrap(),
            0
        );
        assert_eq!(service.publisher().event_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_order_checks_ownership() {
        let service = service();
        let alice = RequestContext::customer("alice");
        let order = service.create_order(&alice, cmd("alice")).await.unwrap();

        assert_eq!(service.get_order(&alice, order.id()).await.unwrap(), order);
        assert!(service.get_order(&staff(), order.id()).await.is_ok());

        let bob = RequestContext::customer("bob");
        assert!(matches!(
            service.get_order(&bob, order.id()).await,
            Err(DomainError::Forbidden {
                permission: Permission::ReadAnyOrder,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let result = service().get_order(&staff(), OrderId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_user_orders_default_page_size() {
        let service = service();
        let alice = RequestContext::customer("alice");
        for _ in 0..12 {
            service.create_order(&alice, cmd("alice")).await.unwrap();
        }
        let user = UserId::new("alice");

        assert_eq!(
            service.get_user_orders(&alice, &user, 0, 0).await.unwrap().len(),
            10
        );
        assert_eq!(
            service.get_user_orders(&alice, &user, -5, 0).await.unwrap().len(),
            10
        );
        assert_eq!(
            service.get_user_orders(&alice, &user, 5, 10).await.unwrap().len(),
            2
        );

        let bob = RequestContext::customer("bob");
        assert!(matches!(
            service.get_user_orders(&bob, &user, 10, 0).await,
            Err(DomainError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_user_orders_negative_offset_reaches_store() {
        let service = service();
        let user = UserId::new("alice");
        let result = service
            .get_user_orders(&RequestContext::customer("alice"), &user, 10, -1)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Store(order_store::StoreError::InvalidQuery(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_order_status_bumps_version() {
        let service = service();
        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();

        let paid = service
            .update_order_status(&staff(), order.id(), OrderStatus::Paid)
            .await
            .unwrap();

        assert_eq!(paid.status(), OrderStatus::Paid);
        assert_eq!(paid.version(), Version::new(2));
        let events = service.publisher().events_for(order.id()).await;
        let Some(OrderEvent::OrderStatusChanged(data)) = events.last() else {
            panic!("expected OrderStatusChanged");
        };
        assert_eq!(data.previous_status, OrderStatus::Created);
        assert_eq!(data.new_status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_store_unchanged() {
        let service = service();
        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();

        let result = service
            .update_order_status(&staff(), order.id(), OrderStatus::Shipped)
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidTransition {
                from: OrderStatus::Created,
                to: OrderStatus::Shipped
            }))
        ));
        let stored = service.repository().get_by_id(order.id()).await.unwrap();
        assert_eq!(stored.version(), Version::first());
    }

    #[tokio::test]
    async fn test_customer_cannot_update_status() {
        let service = service();
        let alice = RequestContext::customer("alice");
        let order = service.create_order(&alice, cmd("alice")).await.unwrap();

        let result = service
            .update_order_status(&alice, order.id(), OrderStatus::Paid)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Forbidden {
                permission: Permission::UpdateStatus,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_status_cancel_releases_inventory() {
        let service = service();
        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();
        service.publisher().clear().await;

        service
            .update_order_status(&staff(), order.id(), OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(
            service.publisher().event_types().await,
            vec!["OrderStatusChanged", "InventoryReleased"]
        );
    }

    #[tokio::test]
    async fn test_add_payment_to_order() {
        let service = service();
        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();

        let updated = service
            .add_payment_to_order(
                &staff(),
                order.id(),
                PaymentDetails::new(PaymentMethod::Card, "txn-1", Money::from_cents(2000)),
            )
            .await
            .unwrap();

        assert_eq!(updated.payments().len(), 1);
        assert_eq!(updated.status(), OrderStatus::Created);
        assert_eq!(updated.version(), Version::new(2));
        assert_eq!(
            service.publisher().event_types().await.last(),
            Some(&"PaymentProcessed")
        );
    }

    #[tokio::test]
    async fn test_add_tracking_code_publishes_tracking_event() {
        let service = service();
        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();
        service.publisher().clear().await;

        let updated = service
            .add_tracking_code_to_order(&staff(), order.id(), " 1Z999 ")
            .await
            .unwrap();

        assert_eq!(updated.tracking_codes(), ["1Z999".to_string()]);
        let events = service.publisher().events().await;
        assert_eq!(events.len(), 1);
        let OrderEvent::OrderTrackingAdded(data) = &events[0] else {
            panic!("expected OrderTrackingAdded");
        };
        assert_eq!(data.tracking_code, "1Z999");
        assert_eq!(data.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_customer_cancels_own_order_only() {
        let service = service();
        let alice = RequestContext::customer("alice");
        let order = service.create_order(&alice, cmd("alice")).await.unwrap();

        let bob = RequestContext::customer("bob");
        assert!(matches!(
            service.cancel_order(&bob, order.id()).await,
            Err(DomainError::Forbidden {
                permission: Permission::CancelAnyOrder,
                ..
            })
        ));

        let cancelled = service.cancel_order(&alice, order.id()).await.unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(cancelled.version(), Version::new(2));
    }

    #[tokio::test]
    async fn test_create_order_rejects_total_overflow_before_writing() {
        let service = service();
        let huge = CreateOrder::shipped_to(
            "alice",
            vec![OrderItem::new("PROD-001", "SKU-001", 3, Money::from_cents(i64::MAX / 2))],
            address(),
        );

        let result = service.create_order(&staff(), huge).await;

        let Err(error) = result else {
            panic!("expected AmountOverflow");
        };
        assert!(matches!(error, DomainError::Order(OrderError::AmountOverflow)));
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            service.repository().count(OrderFilter::new()).await.unwrap(),
            0
        );
        assert_eq!(service.publisher().event_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_payment_rejects_amount_paid_overflow() {
        let service = service();
        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();
        let half = Money::from_cents(i64::MAX / 2);
        for txn in ["txn-1", "txn-2"] {
            service
                .add_payment_to_order(
                    &staff(),
                    order.id(),
                    PaymentDetails::new(PaymentMethod::Card, txn, half),
                )
                .await
                .unwrap();
        }

        let result = service
            .add_payment_to_order(
                &staff(),
                order.id(),
                PaymentDetails::new(PaymentMethod::Card, "txn-3", half),
            )
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::AmountOverflow))
        ));
        let stored = service.repository().get_by_id(order.id()).await.unwrap();
        assert_eq!(stored.payments().len(), 2);
        assert_eq!(stored.version(), Version::new(3));
        assert_eq!(stored.amount_paid().cents(), i64::MAX - 1);
    }

    #[tokio::test]
    async fn test_unbounded_operation_timeout() {
        let config = ServiceConfig::default().with_operation_timeout(Duration::from_millis(u64::MAX));
        let service = OrderService::with_config(
            DocumentOrderRepository::new(InMemoryDocumentStore::new()),
            InMemoryEventPublisher::new(),
            config,
        );

        let order = service.create_order(&staff(), cmd("alice")).await.unwrap();
        let paid = service
            .update_order_status(&staff(), order.id(), OrderStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.version(), Version::new(2));
    }

    /// Records the `operation` label of every histogram touched.
    #[derive(Default)]
    struct HistogramLabels(std::sync::Mutex<Vec<(String, String)>>);

    impl metrics::Recorder for HistogramLabels {
        fn describe_counter(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn describe_gauge(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn describe_histogram(
            &self,
            _: metrics::KeyName,
            _: Option<metrics::Unit>,
            _: metrics::SharedString,
        ) {
        }

        fn register_counter(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Counter {
            metrics::Counter::noop()
        }

        fn register_gauge(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
            metrics::Gauge::noop()
        }

        fn register_histogram(
            &self,
            key: &metrics::Key,
            _: &metrics::Metadata<'_>,
        ) -> metrics::Histogram {
            for label in key.labels() {
                if label.key() == "operation" {
                    self.0
                        .lock()
                        .unwrap()
                        .push((key.name().to_string(), label.value().to_string()));
                }
            }
            metrics::Histogram::noop()
        }
    }

    #[test]
    fn test_create_durations_are_labelled_per_operation() {
        let recorder = HistogramLabels::default();
        metrics::with_local_recorder(&recorder, || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let service = service();
                service.create_order(&staff(), cmd("alice")).await.unwrap();
                service
                    .create_pos_order(&staff(), cmd("alice").at_point_of_sale("store-12", "clerk-7"))
                    .await
                    .unwrap();
                let txn = cmd("alice")
                    .at_point_of_sale("store-12", "clerk-7")
                    .paid_with(PaymentDetails::new(
                        PaymentMethod::Cash,
                        "till-42",
                        Money::from_cents(2000),
                    ));
                service
                    .process_quick_pos_transaction(&staff(), txn)
                    .await
                    .unwrap();
            });
        });

        let operations: Vec<String> = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == "order_operation_duration_seconds")
            .map(|(_, operation)| operation.clone())
            .collect();
        assert_eq!(
            operations,
            ["create_order", "create_pos_order", "process_quick_pos_transaction"]
        );
    }

    #[tokio::test]
    async fn test_admin_requires_manage_orders() {
        let service = service();
        assert!(matches!(
            service.admin(&staff()),
            Err(DomainError::Forbidden {
                permission: Permission::ManageOrders,
                ..
            })
        ));
        assert!(service.admin(&RequestContext::admin("root")).is_ok());
    }
}
