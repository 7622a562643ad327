//! OData-style query layer for collection endpoints.
//!
//! Covers a closed operator set: `$filter` (comparisons, `and`/`or`/`not`,
//! `contains`/`startswith`/`endswith`), `$orderby`, `$top`, `$skip`, `$count`
//! and `$expand`. Anything else is rejected with a [`ValidationError`] before
//! storage is touched.
//!
//! ```
//! use category_odata::entity::CATEGORY_SCHEMA;
//! use category_odata::odata::{translate, QueryOptions, CATEGORY_CAPABILITIES};
//!
//! let options = QueryOptions::parse("$filter=startswith(name,'Bo')&$top=5").unwrap();
//! let query = translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA).unwrap();
//! assert_eq!(query.top, Some(5));
//! ```

pub mod capabilities;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod options;
pub mod translate;

pub use capabilities::{QueryCapabilities, CATEGORY_CAPABILITIES};
pub use error::ValidationError;
pub use filter::{FilterExpr, OrderByItem};
pub use options::QueryOptions;
pub use translate::{translate, ComposedQuery};
