//! Error boundary: the only writer of error response bodies.
//!
//! # Responsibilities
//! - Render operational errors with their status code and message
//! - Render defects as a generic 500 without leaking detail
//! - Hand defects to observability (logs, metrics)
//!
//! # Design Decisions
//! - Infallible: rendering can not itself produce an error
//! - Responses carrying a [`ForwardedError`] extension are re-rendered, so
//!   errors returned from inside a mounted router land here too

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::Mode;
use crate::error::{AppError, ErrorBody, ErrorStatus, ForwardedError};
use crate::observability::metrics;

/// Message sent to clients for non-operational errors.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

#[derive(Debug, Clone, Copy)]
pub struct ErrorBoundary {
    mode: Mode,
}

impl ErrorBoundary {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// Translate an error into the uniform response.
    pub fn render(&self, error: &AppError) -> Response {
        metrics::record_error(error.is_operational());

        if error.is_operational() {
            if self.mode.is_development() || error.status_code().is_server_error() {
                tracing::warn!(
                    status = error.status_code().as_u16(),
                    message = %error.message(),
                    "Operational error"
                );
            }
            return Self::respond(error.status_code(), error.status(), error.message());
        }

        tracing::error!(
            error = %error,
            source = ?std::error::Error::source(error),
            "Unexpected error"
        );
        Self::respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorStatus::Error,
            GENERIC_ERROR_MESSAGE,
        )
    }

    /// Pass successful responses through, re-render forwarded errors.
    pub fn intercept(&self, response: Response) -> Response {
        match response.extensions().get::<ForwardedError>().cloned() {
            Some(ForwardedError(error)) => self.render(&error),
            None => response,
        }
    }

    fn respond(code: StatusCode, status: ErrorStatus, message: &str) -> Response {
        let mut response = (code, Json(ErrorBody { status, message })).into_response();
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_operational_error_keeps_status_and_message() {
        let boundary = ErrorBoundary::new(Mode::Production);
        let response = boundary.render(&AppError::not_found("/api/nonexistent"));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"status": "fail", "message": "Can't find /api/nonexistent on this server"})
        );
    }

    #[tokio::test]
    async fn test_defect_is_generic() {
        let boundary = ErrorBoundary::new(Mode::Development);
        let response = boundary.render(&AppError::defect("connection string leaked"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"status": "error", "message": GENERIC_ERROR_MESSAGE})
        );
    }

    #[tokio::test]
    async fn test_operational_server_error_is_error_band() {
        let boundary = ErrorBoundary::new(Mode::Production);
        let response =
            boundary.render(&AppError::new("Service temporarily unavailable", StatusCode::BAD_GATEWAY));

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_json(response).await,
            json!({"status": "error", "message": "Service temporarily unavailable"})
        );
    }

    #[tokio::test]
    async fn test_intercept_renders_forwarded_error() {
        let boundary = ErrorBoundary::new(Mode::Production);
        let forwarded = AppError::new("Review not found", StatusCode::NOT_FOUND).into_response();
        let response = boundary.intercept(forwarded);

        assert_eq!(
            body_json(response).await,
            json!({"status": "fail", "message": "Review not found"})
        );
    }

    #[tokio::test]
    async fn test_intercept_passes_plain_response() {
        let boundary = ErrorBoundary::new(Mode::Production);
        let response = boundary.intercept((StatusCode::CREATED, "made").into_response());

        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"made");
    }
}
