//! HTTP surface: routing, response rendering and API documentation.

pub mod docs;
pub mod response;
pub mod service;

pub use response::{ApiError, ApiResponse};
pub use service::{CategoryService, Route};
