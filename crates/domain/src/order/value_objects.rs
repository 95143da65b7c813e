//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// The largest representable amount.
    pub const MAX: Money = Money { cents: i64::MAX };

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }

    /// Sums amounts, or `None` if any partial sum overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// A line in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Stock keeping unit the line reserves inventory against.
    pub sku: String,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit in cents.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: impl Into<ProductId>,
        sku: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            sku: sku.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns `quantity * unit_price`, or `None` on overflow.
    pub fn total_price(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

impl Address {
    pub fn new(
        line1: impl Into<String>,
        city: impl Into<String>,
        region: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            line1: line1.into(),
            line2: None,
            city: city.into(),
            region: region.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    pub fn with_line2(mut self, line2: impl Into<String>) -> Self {
        self.line2 = Some(line2.into());
        self
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    Cash,
    GiftCard,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::GiftCard => "GiftCard",
            PaymentMethod::BankTransfer => "BankTransfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment recorded against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,

    /// Reference assigned by the payment processor or till.
    pub transaction_id: String,

    /// Always positive.
    pub amount: Money,

    pub recorded_at: DateTime<Utc>,
}

/// Where an order was placed.
///
/// Point-of-sale orders always carry the till location and the staff member
/// who rang them up.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OrderSource {
    #[default]
    Web,
    PointOfSale {
        location_id: String,
        staff_id: String,
    },
}

impl OrderSource {
    /// Returns true for point-of-sale orders.
    pub fn is_point_of_sale(&self) -> bool {
        matches!(self, OrderSource::PointOfSale { .. })
    }

    /// Returns the till location for point-of-sale orders.
    pub fn location_id(&self) -> Option<&str> {
        match self {
            OrderSource::PointOfSale { location_id, .. } => Some(location_id),
            OrderSource::Web => None,
        }
    }

    /// Returns the staff member for point-of-sale orders.
    pub fn staff_id(&self) -> Option<&str> {
        match self {
            OrderSource::PointOfSale { staff_id, .. } => Some(staff_id),
            OrderSource::Web => None,
        }
    }
}
