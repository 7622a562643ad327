//! HTTP routing for the Category service.
//!
//! [`CategoryService::handle`] maps a method, request target and `Host` header
//! to an [`ApiResponse`] without touching sockets; the may_minihttp
//! [`HttpService`] impl only extracts those three values and writes the result.

use super::docs::{openapi_document, reference_page, OPENAPI_PATH, REFERENCE_PATH};
use super::response::{ApiError, ApiResponse, HTML, ODATA_JSON, TEXT};
use crate::context::CategoryContext;
use crate::entity::CATEGORY_SCHEMA;
use crate::executor::StorageError;
use crate::odata::metadata::{metadata_document, service_document};
use crate::odata::{translate, QueryOptions, CATEGORY_CAPABILITIES};
use crate::seed::seed_categories;
use crate::store::CategoryStore;
use may_minihttp::{HttpService, Request, Response};
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Routes served by [`CategoryService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Categories,
    CategoriesCount,
    SeedCategories,
    ServiceDocument,
    Metadata,
    OpenApi,
    Reference,
    Metrics,
    Unknown,
}

impl Route {
    /// Match a request path (no query string), ignoring ASCII case and a trailing slash.
    pub fn from_path(path: &str) -> Route {
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };
        let is = |candidate: &str| path.eq_ignore_ascii_case(candidate);

        if is("/odata/Categories") {
            Route::Categories
        } else if is("/odata/Categories/$count") || is("/odata/Categories/%24count") {
            Route::CategoriesCount
        } else if is("/seed-data/categories") {
            Route::SeedCategories
        } else if is("/odata") {
            Route::ServiceDocument
        } else if is("/odata/$metadata") || is("/odata/%24metadata") {
            Route::Metadata
        } else if is(OPENAPI_PATH) {
            Route::OpenApi
        } else if is(REFERENCE_PATH) {
            Route::Reference
        } else if cfg!(feature = "metrics") && is("/metrics") {
            Route::Metrics
        } else {
            Route::Unknown
        }
    }

    /// Label used in logs and the request counter.
    pub fn label(&self) -> &'static str {
        match self {
            Route::Categories => "categories",
            Route::CategoriesCount => "categories_count",
            Route::SeedCategories => "seed_categories",
            Route::ServiceDocument => "service_document",
            Route::Metadata => "metadata",
            Route::OpenApi => "openapi",
            Route::Reference => "reference",
            Route::Metrics => "metrics",
            Route::Unknown => "unknown",
        }
    }
}

struct AppState<S> {
    store: S,
    seed_count: usize,
}

/// The HTTP service. Cloned once per connection by the server; all clones
/// share one store.
pub struct CategoryService<S> {
    state: Arc<AppState<S>>,
}

impl<S> Clone for CategoryService<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: CategoryStore> CategoryService<S> {
    /// `seed_count` rows are inserted per call to the seed endpoint.
    pub fn new(store: S, seed_count: usize) -> Self {
        Self {
            state: Arc::new(AppState { store, seed_count }),
        }
    }

    pub fn store(&self) -> &S {
        &self.state.store
    }

    /// Route one request.
    pub fn handle(&self, method: &str, target: &str, host: Option<&str>) -> (Route, ApiResponse) {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let route = Route::from_path(path);

        let result = if route == Route::Unknown {
            Err(ApiError::NotFound(path.to_string()))
        } else if method != "GET" {
            Err(ApiError::MethodNotAllowed(method.to_string()))
        } else {
            self.dispatch(route, query, &context_base(host))
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ApiError::Storage(e) => log::error!("{} {} failed: {}", method, path, e),
                    other => log::debug!("{} {} rejected: {}", method, path, other),
                }
                err.into_response()
            }
        };
        (route, response)
    }

    fn dispatch(&self, route: Route, query: &str, base: &str) -> Result<ApiResponse, ApiError> {
        match route {
            Route::Categories => self.query_categories(query, base),
            Route::CategoriesCount => self.count_categories(query),
            Route::SeedCategories => self.seed(),
            Route::ServiceDocument => Ok(ApiResponse::json(
                200,
                ODATA_JSON,
                &service_document(&CATEGORY_SCHEMA, &format!("{base}/odata")),
            )),
            Route::Metadata => Ok(ApiResponse::ok_json(&metadata_document(
                &CATEGORY_SCHEMA,
                &CATEGORY_CAPABILITIES,
            ))),
            Route::OpenApi => Ok(ApiResponse::ok_json(&openapi_document())),
            Route::Reference => Ok(ApiResponse::ok_text(HTML, reference_page())),
            Route::Metrics => render_metrics(),
            Route::Unknown => Err(ApiError::NotFound(String::new())),
        }
    }

    /// `GET /odata/Categories`
    fn query_categories(&self, query: &str, base: &str) -> Result<ApiResponse, ApiError> {
        let options = QueryOptions::parse(query)?;
        let composed = translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA)?;

        let context = CategoryContext::new(&self.state.store);
        let page = context.categories().execute(&composed)?;

        let value = serde_json::to_value(&page.items)
            .map_err(|e| StorageError::ParseError(format!("Failed to serialize categories: {e}")))?;

        let mut body = Map::new();
        body.insert(
            "@odata.context".into(),
            Value::String(format!(
                "{base}/odata/$metadata#{}",
                CATEGORY_SCHEMA.entity_set
            )),
        );
        if let Some(count) = page.count {
            body.insert("@odata.count".into(), Value::from(count));
        }
        body.insert("value".into(), value);
        Ok(ApiResponse::json(200, ODATA_JSON, &Value::Object(body)))
    }

    /// `GET /odata/Categories/$count`: the filtered count as plain text.
    fn count_categories(&self, query: &str) -> Result<ApiResponse, ApiError> {
        let options = QueryOptions::parse(query)?;
        let composed = translate(&options, &CATEGORY_CAPABILITIES, &CATEGORY_SCHEMA)?;

        let context = CategoryContext::new(&self.state.store);
        let count = context.categories().count(&composed)?;
        Ok(ApiResponse::ok_text(TEXT, count.to_string()))
    }

    /// `GET /seed-data/categories`
    fn seed(&self) -> Result<ApiResponse, ApiError> {
        let mut context = CategoryContext::new(&self.state.store);
        let inserted = seed_categories(&mut context, self.state.seed_count)?;
        #[cfg(feature = "metrics")]
        METRICS.record_seeded(inserted.len());
        #[cfg(not(feature = "metrics"))]
        let _ = inserted;
        Ok(ApiResponse::no_content())
    }
}

/// Absolute service root when the client sent a `Host` header, relative otherwise.
fn context_base(host: Option<&str>) -> String {
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(host) => format!("http://{host}"),
        None => String::new(),
    }
}

#[cfg(feature = "metrics")]
fn render_metrics() -> Result<ApiResponse, ApiError> {
    match METRICS.render() {
        Ok(text) => Ok(ApiResponse::ok_text(super::response::PROMETHEUS_TEXT, text)),
        Err(e) => {
            log::error!("Failed to render metrics: {}", e);
            Err(ApiError::Storage(StorageError::Unavailable(e.to_string())))
        }
    }
}

#[cfg(not(feature = "metrics"))]
fn render_metrics() -> Result<ApiResponse, ApiError> {
    Err(ApiError::NotFound("/metrics".to_string()))
}

impl<S> HttpService for CategoryService<S>
where
    S: CategoryStore + Send + Sync + 'static,
{
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let start = Instant::now();
        let host = req
            .headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case("host"))
            .and_then(|h| std::str::from_utf8(h.value).ok());

        let (route, response) = self.handle(req.method(), req.path(), host);

        log::info!(
            "{} {} {} {:?}",
            req.method(),
            req.path(),
            response.status,
            start.elapsed()
        );
        #[cfg(feature = "metrics")]
        METRICS.record_request(route.label(), response.status);
        #[cfg(not(feature = "metrics"))]
        let _ = route;

        response.write_to(res);
        Ok(())
    }
}
