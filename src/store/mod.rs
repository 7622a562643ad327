//! Category storage backends.
//!
//! [`CategoryStore`] is what a [`CategoryContext`](crate::context::CategoryContext)
//! talks to. The PostgreSQL store is the production backend; the in-memory
//! store evaluates the same [`ComposedQuery`] without a database, which is
//! what the unit tests and doctests run against.

use crate::entity::{Category, NewCategory};
use crate::executor::StorageError;
use crate::odata::ComposedQuery;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgCategoryStore;

/// One materialized page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    /// Total matching rows before `$top`/`$skip`, when `$count=true`.
    pub count: Option<u64>,
}

/// Backend operations needed by the Category endpoints.
pub trait CategoryStore {
    /// Execute `query` and return the requested page.
    fn fetch(&self, query: &ComposedQuery) -> Result<QueryPage<Category>, StorageError>;

    /// Number of rows matching the filter of `query`; ordering and paging are ignored.
    fn count(&self, query: &ComposedQuery) -> Result<u64, StorageError>;

    /// Insert all `records` atomically, returning them with their assigned ids.
    fn insert_all(&self, records: &[NewCategory]) -> Result<Vec<Category>, StorageError>;
}

impl<S: CategoryStore + ?Sized> CategoryStore for &S {
    fn fetch(&self, query: &ComposedQuery) -> Result<QueryPage<Category>, StorageError> {
        (**self).fetch(query)
    }

    fn count(&self, query: &ComposedQuery) -> Result<u64, StorageError> {
        (**self).count(query)
    }

    fn insert_all(&self, records: &[NewCategory]) -> Result<Vec<Category>, StorageError> {
        (**self).insert_all(records)
    }
}
