//! Shared types for the order engine: identifiers and the per-call
//! request context with its role/permission lattice.

pub mod access;
pub mod types;

pub use access::{Permission, RequestContext, Role, deadline_after};
pub use types::{OrderId, UserId};
