//! Storage drivers for order documents.
//!
//! The [`DocumentStore`] trait is the storage side of the order repository:
//! unconditional insert, lookup, an atomic compare-and-swap on `version`,
//! and filtered listing. Drivers exist for memory and PostgreSQL.

pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{OrderId, UserId};
pub use config::StoreConfig;
pub use document::{OrderDocument, OrderDocumentBuilder, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt};
