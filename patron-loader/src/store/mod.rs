//! Persistent store boundary
//!
//! The loader and the shell only ever talk to a [`Store`]. The reload
//! protocol needs four primitives from it (drop, unique index, insert-if-absent
//! and bulk insert); the remaining methods create the empty collections and
//! serve the read-only shell.

mod error;
mod filter;
mod sqlite;
mod value;

pub use error::StoreError;
pub use filter::{Condition, Filter, QueryError, parse_filter};
pub use sqlite::SqliteStore;
pub use value::{Document, QueryValue};

use async_trait::async_trait;

use crate::model::{Collection, PatronRecord, Reference};

#[async_trait]
pub trait Store: Send + Sync {
    /// Destroy a collection and its contents
    ///
    /// Returns [`StoreError::NotFound`] when there was nothing to drop.
    async fn drop_collection(&self, collection: Collection) -> Result<(), StoreError>;

    /// Create an empty collection if it does not exist yet
    async fn create_collection(&self, collection: Collection) -> Result<(), StoreError>;

    async fn create_unique_index(
        &self,
        collection: Collection,
        field: &str,
    ) -> Result<(), StoreError>;

    /// Non-unique lookup index
    async fn create_index(&self, collection: Collection, field: &str) -> Result<(), StoreError>;

    /// Insert a reference unless one with the same code exists
    ///
    /// Returns whether a new entity was created. An existing entity is never
    /// modified.
    async fn upsert_reference(&self, reference: &Reference) -> Result<bool, StoreError>;

    /// Insert every record or none of them
    async fn insert_patrons(&self, records: &[PatronRecord]) -> Result<u64, StoreError>;

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Number of documents per distinct value of `field`
    async fn group_count(
        &self,
        collection: Collection,
        field: &str,
    ) -> Result<Vec<(QueryValue, u64)>, StoreError>;
}
