//! # category-odata
//!
//! OData-style HTTP API over a single PostgreSQL table of product categories,
//! served from `may` coroutines.
//!
//! * [`odata`] parses and validates `$filter`, `$orderby`, `$top`, `$skip`,
//!   `$count` and `$expand`, and composes a sea-query statement.
//! * [`context::CategoryContext`] is the per-request unit of work over a
//!   [`store::CategoryStore`].
//! * [`api::CategoryService`] is the may_minihttp service.

pub mod api;
pub mod config;
pub mod connection;
pub mod context;
pub mod entity;
pub mod executor;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod odata;
pub mod pool;
pub mod schema;
pub mod seed;
pub mod store;
pub mod transaction;
mod value_conversion;

pub use connection::{connect, ConnectionError};
pub use context::CategoryContext;
pub use entity::{Category, NewCategory, CATEGORY_SCHEMA};
pub use executor::{PgExecutor, SqlExecutor, StorageError};
pub use pool::DbPool;
pub use store::{CategoryStore, MemoryStore, PgCategoryStore};
pub use transaction::Transaction;
