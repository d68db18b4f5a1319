//! Application errors shared by every pipeline stage and router.
//!
//! # Responsibilities
//! - Carry the client-facing message and intended status code
//! - Classify errors as `fail` (4xx) or `error` (everything else)
//! - Separate operational failures from unexpected defects
//!
//! # Design Decisions
//! - Stages return `Flow::Fail(AppError)`, route handlers return
//!   `Err(AppError)`; handlers inside a mounted axum router may also return
//!   `AppError` as a response, which carries the error in a response
//!   extension for the boundary to pick up
//! - Only the error boundary turns an `AppError` into a response body

use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of an error by its status band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStatus {
    /// Client error (4xx).
    Fail,
    /// Server error or anything outside the 4xx band.
    Error,
}

impl ErrorStatus {
    pub fn from_status_code(code: StatusCode) -> Self {
        if code.is_client_error() {
            ErrorStatus::Fail
        } else {
            ErrorStatus::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Fail => "fail",
            ErrorStatus::Error => "error",
        }
    }
}

/// An error travelling towards the error boundary.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    message: String,
    status_code: StatusCode,
    is_operational: bool,
    #[source]
    source: Option<BoxError>,
}

impl AppError {
    /// Create an operational error with a client-safe message.
    pub fn new(message: impl Into<String>, status_code: StatusCode) -> Self {
        Self {
            message: message.into(),
            status_code,
            is_operational: true,
            source: None,
        }
    }

    /// Wrap an unexpected failure. The message is never shown to clients.
    pub fn internal<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = error.into();
        Self {
            message: source.to_string(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            is_operational: false,
            source: Some(source),
        }
    }

    /// Unexpected failure described only by a message.
    pub fn defect(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            is_operational: false,
            source: None,
        }
    }

    /// Error raised when no router claims `original_url`.
    pub fn not_found(original_url: &str) -> Self {
        Self::new(
            format!("Can't find {original_url} on this server"),
            StatusCode::NOT_FOUND,
        )
    }

    /// Convert a caught panic payload into a defect.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::defect(format!("handler panicked: {detail}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_status_code(self.status_code)
    }

    pub fn is_operational(&self) -> bool {
        self.is_operational
    }
}

/// Response extension marking a response as a forwarded [`AppError`].
///
/// The body of such a response is empty; the boundary replaces it.
#[derive(Debug, Clone)]
pub struct ForwardedError(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = self.status_code.into_response();
        response
            .extensions_mut()
            .insert(ForwardedError(Arc::new(self)));
        response
    }
}

/// JSON envelope written by the error boundary.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub status: ErrorStatus,
    pub message: &'a str,
}
