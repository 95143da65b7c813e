//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use order_store::Version;
use serde::{Deserialize, Serialize};

use super::{
    Address, CreateOrder, Money, OrderError, OrderItem, OrderSource, OrderStatus, Payment,
    PaymentMethod,
};

/// Order aggregate root.
///
/// Every mutation is validated before anything changes: an operation either
/// succeeds, bumping `version` by one and refreshing `updated_at`, or returns
/// an error and leaves the order exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderItem>,
    shipping_address: Address,
    billing_address: Address,
    status: OrderStatus,
    source: OrderSource,
    #[serde(default)]
    payments: Vec<Payment>,
    #[serde(default)]
    tracking_codes: Vec<String>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Construction
impl Order {
    /// Validates a create command and builds a version-1 order in `Created`.
    pub fn place(id: OrderId, cmd: CreateOrder, source: OrderSource) -> Result<Self, OrderError> {
        if cmd.user_id.is_blank() {
            return Err(OrderError::UserIdRequired);
        }
        validate_items(&cmd.items)?;
        if let OrderSource::PointOfSale {
            location_id,
            staff_id,
        } = &source
        {
            if location_id.trim().is_empty() {
                return Err(OrderError::LocationIdRequired);
            }
            if staff_id.trim().is_empty() {
                return Err(OrderError::StaffIdRequired);
            }
        }

        let now = Utc::now();
        Ok(Self {
            id,
            user_id: cmd.user_id,
            items: cmd.items,
            shipping_address: cmd.shipping_address,
            billing_address: cmd.billing_address,
            status: OrderStatus::Created,
            source,
            payments: Vec::new(),
            tracking_codes: Vec::new(),
            version: Version::first(),
            created_at: now,
            updated_at: now,
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn source(&self) -> &OrderSource {
        &self.source
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn tracking_codes(&self) -> &[String] {
        &self.tracking_codes
    }

    /// Returns the optimistic-concurrency token.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the number of order lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the sum of all line totals.
    ///
    /// Validation keeps this in range; a stored order that somehow exceeds
    /// it reports [`Money::MAX`].
    pub fn total_amount(&self) -> Money {
        items_total(&self.items).unwrap_or(Money::MAX)
    }

    /// Returns the sum of all recorded payments, saturating like
    /// [`total_amount`](Self::total_amount).
    pub fn amount_paid(&self) -> Money {
        payments_total(&self.payments).unwrap_or(Money::MAX)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }

    /// Returns true if the order is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Lifecycle operations
impl Order {
    /// Moves the order to `new_status`, returning the status it left.
    pub fn update_status(&mut self, new_status: OrderStatus) -> Result<OrderStatus, OrderError> {
        if !self.status.can_transition_to(new_status) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        let previous = self.status;
        self.status = new_status;
        self.touch();
        Ok(previous)
    }

    /// Records a payment. The status is left alone.
    pub fn add_payment(
        &mut self,
        method: PaymentMethod,
        transaction_id: impl Into<String>,
        amount: Money,
    ) -> Result<&Payment, OrderError> {
        self.ensure_not_cancelled()?;
        if !amount.is_positive() {
            return Err(OrderError::InvalidPaymentAmount {
                amount: amount.cents(),
            });
        }
        let transaction_id = transaction_id.into();
        if transaction_id.trim().is_empty() {
            return Err(OrderError::TransactionIdRequired);
        }
        payments_total(&self.payments)
            .and_then(|paid| paid.checked_add(amount))
            .ok_or(OrderError::AmountOverflow)?;

        let now = Utc::now();
        self.payments.push(Payment {
            method,
            transaction_id,
            amount,
            recorded_at: now,
        });
        self.touch_at(now);
        Ok(&self.payments[self.payments.len() - 1])
    }

    /// Appends a carrier tracking code, stored trimmed.
    pub fn add_tracking_code(&mut self, code: &str) -> Result<(), OrderError> {
        self.ensure_not_cancelled()?;
        let code = code.trim();
        if code.is_empty() {
            return Err(OrderError::EmptyTrackingCode);
        }

        self.tracking_codes.push(code.to_string());
        self.touch();
        Ok(())
    }

    /// Cancels the order, returning the status it left.
    pub fn cancel(&mut self) -> Result<OrderStatus, OrderError> {
        self.update_status(OrderStatus::Cancelled)
    }

    /// Bumps the version without a lifecycle transition.
    pub fn increment_version(&mut self) {
        self.touch();
    }

    fn ensure_not_cancelled(&self) -> Result<(), OrderError> {
        if self.is_cancelled() {
            return Err(OrderError::OrderCancelled);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    fn touch_at(&mut self, now: DateTime<Utc>) {
        self.version = self.version.next();
        self.updated_at = now;
    }
}

// Detail edits for administrative replacement. These do not bump the
// version; the replace path calls `increment_version` once for the batch.
impl Order {
    /// Replaces all order lines.
    pub fn set_items(&mut self, items: Vec<OrderItem>) -> Result<(), OrderError> {
        self.ensure_not_cancelled()?;
        validate_items(&items)?;
        self.items = items;
        Ok(())
    }

    pub fn set_shipping_address(&mut self, address: Address) -> Result<(), OrderError> {
        self.ensure_not_cancelled()?;
        self.shipping_address = address;
        Ok(())
    }

    pub fn set_billing_address(&mut self, address: Address) -> Result<(), OrderError> {
        self.ensure_not_cancelled()?;
        self.billing_address = address;
        Ok(())
    }

    /// Checks the invariants every stored order must satisfy.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.user_id.is_blank() {
            return Err(OrderError::UserIdRequired);
        }
        validate_items(&self.items)
    }
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }
    for item in items {
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
            });
        }
        if !item.unit_price.is_positive() {
            return Err(OrderError::InvalidPrice {
                product_id: item.product_id.to_string(),
                price: item.unit_price.cents(),
            });
        }
    }
    items_total(items).ok_or(OrderError::AmountOverflow)?;
    Ok(())
}

fn items_total(items: &[OrderItem]) -> Option<Money> {
    items.iter().try_fold(Money::zero(), |total, item| {
        total.checked_add(item.total_price()?)
    })
}

fn payments_total(payments: &[Payment]) -> Option<Money> {
    Money::checked_sum(payments.iter().map(|payment| payment.amount))
}
