use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, UserId};

/// Version number of a stored order, used for optimistic concurrency control.
///
/// A freshly created order is at version 1; every committed mutation
/// advances it by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version (0) of an order that has never been stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) an order has right after creation.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the previous version, saturating at [`Version::initial`].
    pub fn previous(&self) -> Self {
        Self((self.0 - 1).max(0))
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// An order as the storage driver sees it.
///
/// The indexed columns (`owner_id`, `status`, `version`, timestamps) sit next
/// to the full serialized aggregate in `body`. Drivers filter on the columns
/// and never look inside the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDocument {
    /// The order this document stores.
    pub id: OrderId,

    /// The customer who owns the order.
    pub owner_id: UserId,

    /// Lifecycle status name (e.g., "Created", "Paid").
    pub status: String,

    /// Version of the order held in `body`.
    pub version: Version,

    /// When the order was created.
    pub created_at: DateTime<Utc>,

    /// When the order was last mutated.
    pub updated_at: DateTime<Utc>,

    /// The serialized aggregate.
    pub body: serde_json::Value,
}

impl OrderDocument {
    /// Creates a new document builder.
    pub fn builder() -> OrderDocumentBuilder {
        OrderDocumentBuilder::default()
    }
}

/// Builder for constructing order documents.
#[derive(Debug, Default)]
pub struct OrderDocumentBuilder {
    id: Option<OrderId>,
    owner_id: Option<UserId>,
    status: Option<String>,
    version: Option<Version>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    body: Option<serde_json::Value>,
}

impl OrderDocumentBuilder {
    pub fn id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn owner_id(mut self, owner_id: impl Into<UserId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the last-update time. If not set, the creation time will be used.
    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Sets the serialized aggregate body.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Tries to build the document, returning None if required fields are missing.
    ///
    /// `id`, `owner_id`, `status` and `body` are required; `version` defaults
    /// to [`Version::first`].
    pub fn try_build(self) -> Option<OrderDocument> {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        Some(OrderDocument {
            id: self.id?,
            owner_id: self.owner_id?,
            status: self.status?,
            version: self.version.unwrap_or_else(Version::first),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            body: self.body?,
        })
    }
}
