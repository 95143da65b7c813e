//! Order commands.

use common::UserId;

use super::{Address, Money, OrderItem, PaymentMethod};

/// Command to place a web order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The customer the order belongs to.
    pub user_id: UserId,

    /// Lines being ordered; must not be empty.
    pub items: Vec<OrderItem>,

    pub shipping_address: Address,

    pub billing_address: Address,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(
        user_id: impl Into<UserId>,
        items: Vec<OrderItem>,
        shipping_address: Address,
        billing_address: Address,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            items,
            shipping_address,
            billing_address,
        }
    }

    /// Creates a command that ships and bills to the same address.
    pub fn shipped_to(user_id: impl Into<UserId>, items: Vec<OrderItem>, address: Address) -> Self {
        Self::new(user_id, items, address.clone(), address)
    }

    /// Turns this into a point-of-sale order rung up at `location_id` by `staff_id`.
    pub fn at_point_of_sale(
        self,
        location_id: impl Into<String>,
        staff_id: impl Into<String>,
    ) -> CreatePosOrder {
        CreatePosOrder {
            order: self,
            location_id: location_id.into(),
            staff_id: staff_id.into(),
        }
    }
}

/// Command to place an order from a point-of-sale terminal.
#[derive(Debug, Clone)]
pub struct CreatePosOrder {
    pub order: CreateOrder,

    /// The till the order was rung up at.
    pub location_id: String,

    /// The staff member who rang it up.
    pub staff_id: String,
}

impl CreatePosOrder {
    /// Attaches a payment taken at the till.
    pub fn paid_with(self, payment: PaymentDetails) -> QuickPosTransaction {
        QuickPosTransaction {
            order: self,
            payment,
        }
    }
}

/// A payment as submitted by a caller, before it is recorded on an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub amount: Money,
}

impl PaymentDetails {
    pub fn new(method: PaymentMethod, transaction_id: impl Into<String>, amount: Money) -> Self {
        Self {
            method,
            transaction_id: transaction_id.into(),
            amount,
        }
    }
}

/// Command to create a point-of-sale order and record its payment in one call.
#[derive(Debug, Clone)]
pub struct QuickPosTransaction {
    pub order: CreatePosOrder,
    pub payment: PaymentDetails,
}
