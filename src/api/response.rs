//! Response values and the HTTP error mapping.

use crate::executor::StorageError;
use crate::odata::ValidationError;
use may_minihttp::Response;
use serde_json::{json, Value};
use std::fmt;

pub const ODATA_JSON: &str = "application/json; odata.metadata=minimal";
pub const JSON: &str = "application/json";
pub const HTML: &str = "text/html; charset=utf-8";
pub const TEXT: &str = "text/plain; charset=utf-8";
pub const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Generic message returned for every server-side failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An error has occurred.";

/// A fully rendered response, independent of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
    /// Send `Allow: GET` (405 responses).
    pub allow_get: bool,
}

impl ApiResponse {
    pub fn json(status: u16, content_type: &'static str, value: &Value) -> Self {
        Self {
            status,
            content_type: Some(content_type),
            body: value.to_string().into_bytes(),
            allow_get: false,
        }
    }

    pub fn ok_json(value: &Value) -> Self {
        Self::json(200, JSON, value)
    }

    pub fn ok_text(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type),
            body: body.into(),
            allow_get: false,
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: None,
            body: Vec::new(),
            allow_get: false,
        }
    }

    /// The body as JSON; `Value::Null` when it is empty or not JSON.
    pub fn json_body(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// Write status, headers and body into a may_minihttp response.
    pub fn write_to(self, res: &mut Response) {
        res.status_code(self.status as usize, reason_phrase(self.status));
        if let Some(content_type) = self.content_type {
            res.header(content_type_header(content_type));
        }
        if self.allow_get {
            res.header("Allow: GET");
        }
        if !self.body.is_empty() {
            res.body_vec(self.body);
        }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}

// may_minihttp takes whole header lines with a 'static lifetime
fn content_type_header(content_type: &'static str) -> &'static str {
    match content_type {
        ODATA_JSON => "Content-Type: application/json; odata.metadata=minimal",
        HTML => "Content-Type: text/html; charset=utf-8",
        TEXT => "Content-Type: text/plain; charset=utf-8",
        PROMETHEUS_TEXT => "Content-Type: text/plain; version=0.0.4; charset=utf-8",
        _ => "Content-Type: application/json",
    }
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Storage(StorageError),
    NotFound(String),
    MethodNotAllowed(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Storage(_) => 500,
        }
    }

    /// OData error body. Storage details never leave the process.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(e) => json!({
                "error": { "code": e.code(), "message": e.to_string(), "target": e.target() }
            }),
            ApiError::Storage(_) => json!({
                "error": { "code": "internal_error", "message": INTERNAL_ERROR_MESSAGE }
            }),
            ApiError::NotFound(path) => json!({
                "error": { "code": "not_found", "message": format!("No resource at '{path}'") }
            }),
            ApiError::MethodNotAllowed(method) => json!({
                "error": {
                    "code": "method_not_allowed",
                    "message": format!("Method '{method}' is not allowed; use GET"),
                }
            }),
        }
    }

    pub fn into_response(self) -> ApiResponse {
        let mut response = ApiResponse::json(self.status(), JSON, &self.body());
        response.allow_get = matches!(self, ApiError::MethodNotAllowed(_));
        response
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(e) => write!(f, "Invalid query: {e}"),
            ApiError::Storage(e) => write!(f, "Storage failure: {e}"),
            ApiError::NotFound(path) => write!(f, "Not found: {path}"),
            ApiError::MethodNotAllowed(method) => write!(f, "Method not allowed: {method}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Validation(e) => Some(e),
            ApiError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_body() {
        let err = ApiError::from(ValidationError::NotAllowed { option: "$select" });
        assert_eq!(err.status(), 400);
        let body = err.body();
        assert_eq!(body["error"]["code"], "query_option_not_allowed");
        assert_eq!(body["error"]["target"], "$select");
    }

    #[test]
    fn test_storage_error_is_generic() {
        let err = ApiError::from(StorageError::QueryError("relation \"category\" does not exist".into()));
        let response = err.into_response();
        assert_eq!(response.status, 500);
        let body = response.json_body();
        assert_eq!(body["error"]["message"], INTERNAL_ERROR_MESSAGE);
        assert!(!String::from_utf8(response.body).unwrap().contains("relation"));
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let response = ApiError::MethodNotAllowed("POST".into()).into_response();
        assert_eq!(response.status, 405);
        assert!(response.allow_get);
    }

    #[test]
    fn test_header_lines() {
        assert_eq!(
            content_type_header(ODATA_JSON),
            "Content-Type: application/json; odata.metadata=minimal"
        );
        assert_eq!(content_type_header(JSON), "Content-Type: application/json");
    }
}
