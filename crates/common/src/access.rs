//! Caller identity and the role/permission lattice.
//!
//! Every order operation receives a [`RequestContext`] explicitly. The
//! authentication layer has already validated the claims it carries; this
//! module only answers "may this role do that".

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::UserId;

/// Stand-in for "no deadline" when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Returns the instant `timeout` from now.
///
/// Timeouts too large to add to the clock, such as `Duration::MAX`, yield a
/// deadline roughly thirty years out.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Something a caller may be allowed to do to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Place an order for the caller.
    CreateOwnOrder,
    /// Place an order on behalf of any customer.
    CreateAnyOrder,
    /// Place an order from a point-of-sale terminal.
    CreatePosOrder,
    /// Read orders belonging to the caller.
    ReadOwnOrders,
    /// Read any order.
    ReadAnyOrder,
    /// Move an order through its lifecycle.
    UpdateStatus,
    /// Record a payment against an order.
    RecordPayment,
    /// Attach carrier tracking codes.
    AddTracking,
    /// Cancel an order belonging to the caller.
    CancelOwnOrder,
    /// Cancel any order.
    CancelAnyOrder,
    /// Administrative replace, delete and reporting.
    ManageOrders,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Permission; 11] = [
        Permission::CreateOwnOrder,
        Permission::CreateAnyOrder,
        Permission::CreatePosOrder,
        Permission::ReadOwnOrders,
        Permission::ReadAnyOrder,
        Permission::UpdateStatus,
        Permission::RecordPayment,
        Permission::AddTracking,
        Permission::CancelOwnOrder,
        Permission::CancelAnyOrder,
        Permission::ManageOrders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateOwnOrder => "create_own_order",
            Permission::CreateAnyOrder => "create_any_order",
            Permission::CreatePosOrder => "create_pos_order",
            Permission::ReadOwnOrders => "read_own_orders",
            Permission::ReadAnyOrder => "read_any_order",
            Permission::UpdateStatus => "update_status",
            Permission::RecordPayment => "record_payment",
            Permission::AddTracking => "add_tracking",
            Permission::CancelOwnOrder => "cancel_own_order",
            Permission::CancelAnyOrder => "cancel_any_order",
            Permission::ManageOrders => "manage_orders",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role claim attached to a request.
///
/// Roles form a small lattice: `Customer` ⊂ `Staff` ⊂ `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

const CUSTOMER_PERMISSIONS: &[Permission] = &[
    Permission::CreateOwnOrder,
    Permission::ReadOwnOrders,
    Permission::CancelOwnOrder,
];

const STAFF_PERMISSIONS: &[Permission] = &[
    Permission::CreateOwnOrder,
    Permission::CreateAnyOrder,
    Permission::CreatePosOrder,
    Permission::ReadOwnOrders,
    Permission::ReadAnyOrder,
    Permission::UpdateStatus,
    Permission::RecordPayment,
    Permission::AddTracking,
    Permission::CancelOwnOrder,
    Permission::CancelAnyOrder,
];

impl Role {
    /// Returns the permissions granted to this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Customer => CUSTOMER_PERMISSIONS,
            Role::Staff => STAFF_PERMISSIONS,
            Role::Admin => &Permission::ALL,
        }
    }

    /// Returns true if this role grants `permission`.
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "Customer",
            Role::Staff => "Staff",
            Role::Admin => "Admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated identity and deadline for a single call into the engine.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Who the call acts for.
    pub user_id: UserId,

    /// The caller's role claim.
    pub role: Role,

    /// When the caller stops waiting. `None` falls back to the service default.
    pub deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline.
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            deadline: None,
        }
    }

    pub fn customer(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn staff(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Staff)
    }

    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(deadline_after(timeout))
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns true if the caller's role grants `permission`.
    pub fn can(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }

    /// Decides access to an order owned by `owner`.
    ///
    /// `any` wins outright; `own` only applies when the caller owns the order.
    pub fn can_act_on(&self, owner: &UserId, own: Permission, any: Permission) -> bool {
        self.can(any) || (self.can(own) && &self.user_id == owner)
    }
}
