//! JSON body parsing with a size ceiling (stage 7).
//!
//! # Responsibilities
//! - Parse `application/json` (and `+json`) bodies into a [`JsonBody`]
//! - Reject bodies above the configured ceiling with 413
//! - Reject malformed JSON with 400
//!
//! # Design Decisions
//! - `Content-Length` above the ceiling is rejected before reading
//! - Bodies without a length are read through [`Limited`], which stops at the
//!   ceiling instead of buffering the whole stream
//! - The parsed bytes are put back as the body so routers that read the raw
//!   body (or forward it upstream) still see it
//! - In strict mode only objects and arrays are accepted at the top level
//! - An empty JSON body parses to `{}`

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};

use crate::config::BodyConfig;
use crate::error::AppError;
use crate::pipeline::{Exchange, Flow, Stage};

/// Parsed JSON body, stored as a request extension.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

#[derive(Debug, Clone)]
pub struct JsonBodyParser {
    limit: usize,
    strict: bool,
}

impl JsonBodyParser {
    pub fn new(config: &BodyConfig) -> Self {
        Self {
            limit: config.json_limit_bytes,
            strict: config.strict,
        }
    }

    fn too_large(&self) -> AppError {
        AppError::new(
            format!("Request body exceeds the {} limit", human_size(self.limit)),
            StatusCode::PAYLOAD_TOO_LARGE,
        )
    }

    fn parse(&self, bytes: &[u8]) -> Result<Value, AppError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Object(Map::new()));
        }

        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            tracing::debug!(error = %e, "Malformed JSON body");
            AppError::new("Invalid JSON in request body", StatusCode::BAD_REQUEST)
        })?;

        if self.strict && !(value.is_object() || value.is_array()) {
            return Err(AppError::new(
                "Request body must be a JSON object or array",
                StatusCode::BAD_REQUEST,
            ));
        }
        Ok(value)
    }
}

fn human_size(bytes: usize) -> String {
    if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{}kb", bytes / 1024)
    } else {
        format!("{bytes}b")
    }
}

/// `application/json` or any `application/*+json` media type.
pub fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl Stage for JsonBodyParser {
    fn name(&self) -> &'static str {
        "json-body"
    }

    async fn on_request(&self, request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        if !is_json(request.headers()) {
            return Flow::Continue(request);
        }

        if declared_length(request.headers()).is_some_and(|len| len > self.limit) {
            return Flow::Fail(self.too_large());
        }

        let (parts, body) = request.into_parts();
        let bytes = match Limited::new(body, self.limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Flow::Fail(self.too_large());
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return Flow::Fail(AppError::new(
                    "Failed to read request body",
                    StatusCode::BAD_REQUEST,
                ));
            }
        };

        let value = match self.parse(&bytes) {
            Ok(value) => value,
            Err(e) => return Flow::Fail(e),
        };

        let mut request = Request::from_parts(parts, Body::from(bytes));
        request.extensions_mut().insert(JsonBody(value));
        Flow::Continue(request)
    }
}
