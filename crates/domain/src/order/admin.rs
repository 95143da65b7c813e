//! Administrative order operations.
//!
//! These bypass the lifecycle API: replacement skips the transition table
//! and deletion skips version checks. They are only reachable through
//! [`OrderService::admin`], which requires `ManageOrders`.

use common::{OrderId, RequestContext};

use crate::error::DomainError;
use crate::publisher::EventPublisher;
use crate::repository::{OrderFilter, OrderRepository};

use super::service::bounded;
use super::{Order, OrderError, OrderService, OrderStatus};

/// Administrative handle bound to one caller.
pub struct OrderAdmin<'a, R, P> {
    service: &'a OrderService<R, P>,
    ctx: &'a RequestContext,
}

impl<'a, R, P> OrderAdmin<'a, R, P>
where
    R: OrderRepository,
    P: EventPublisher + 'static,
{
    pub(crate) fn new(service: &'a OrderService<R, P>, ctx: &'a RequestContext) -> Self {
        Self { service, ctx }
    }

    /// Replaces a stored order with `order`.
    ///
    /// `order` must carry the version it was loaded at. The version is bumped
    /// once and the write expects the loaded version, so a concurrent change
    /// surfaces as `VersionConflict`. Orders that are cancelled in storage
    /// are never overwritten. No events are published.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id(), admin = %self.ctx.user_id))]
    pub async fn update_order(&self, mut order: Order) -> Result<Order, DomainError> {
        order.validate()?;

        let deadline = self.service.deadline(self.ctx);
        let stored = bounded(
            deadline,
            "update_order",
            self.service.repository().get_by_id(order.id()),
        )
        .await?;
        if stored.is_cancelled() {
            return Err(OrderError::OrderCancelled.into());
        }

        order.increment_version();
        self.service.write(self.ctx, &order, "update_order").await?;
        metrics::counter!("order_mutations_total", "operation" => "update_order").increment(1);
        Ok(order)
    }

    /// Removes an order without any version check.
    #[tracing::instrument(skip(self), fields(admin = %self.ctx.user_id))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), DomainError> {
        let deadline = self.service.deadline(self.ctx);
        let removed = bounded(
            deadline,
            "delete_order",
            self.service.repository().delete(order_id),
        )
        .await?;
        if !removed {
            return Err(DomainError::NotFound(order_id));
        }
        tracing::info!(%order_id, "order deleted");
        Ok(())
    }

    /// Lists orders across all users, optionally filtered by status.
    ///
    /// `limit <= 0` falls back to the configured page size.
    #[tracing::instrument(skip(self), fields(admin = %self.ctx.user_id))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, DomainError> {
        let filter = OrderFilter {
            user_id: None,
            status,
        };
        let deadline = self.service.deadline(self.ctx);
        bounded(
            deadline,
            "list_orders",
            self.service
                .repository()
                .list(filter, self.service.page_size(limit), offset),
        )
        .await
    }

    /// Counts orders in `status`.
    #[tracing::instrument(skip(self), fields(admin = %self.ctx.user_id))]
    pub async fn count_orders_by_status(&self, status: OrderStatus) -> Result<u64, DomainError> {
        let deadline = self.service.deadline(self.ctx);
        bounded(
            deadline,
            "count_orders_by_status",
            self.service
                .repository()
                .count(OrderFilter::for_status(status)),
        )
        .await
    }
}
