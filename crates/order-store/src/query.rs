use crate::UserId;

/// Builder for filtering stored orders.
///
/// Filters combine with AND. `limit` and `offset` page through the matches in
/// creation order and are ignored by `count`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Filter by owning user.
    pub owner_id: Option<UserId>,

    /// Filter by status name.
    pub status: Option<String>,

    /// Maximum number of documents to return.
    pub limit: Option<i64>,

    /// Number of documents to skip. Passed through to the driver as given.
    pub offset: Option<i64>,
}

impl DocumentQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for orders owned by a user.
    pub fn for_owner(owner_id: impl Into<UserId>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }

    /// Creates a query for orders in a status.
    pub fn for_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    /// Filters by owning user.
    pub fn owner_id(mut self, owner_id: impl Into<UserId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Filters by status name.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the document's indexed columns match every filter.
    pub fn matches(&self, document: &crate::OrderDocument) -> bool {
        if let Some(ref owner) = self.owner_id
            && &document.owner_id != owner
        {
            return false;
        }
        if let Some(ref status) = self.status
            && &document.status != status
        {
            return false;
        }
        true
    }
}
