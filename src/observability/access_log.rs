//! Access logging (stage 3).
//!
//! One event per response on the `access` target. Development logs the
//! concise field set; production adds the peer address, HTTP version, request
//! id and user agent. Request metrics are recorded at the same point.
//!
//! [`trace_layer`] opens the `request` span around the whole pipeline, so the
//! access event and everything a stage or router logs carry the request's
//! method and URI (and its id in production).

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use axum::response::Response;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnBodyChunk, DefaultOnEos, MakeSpan, TraceLayer};
use tracing::Span;

use crate::config::Mode;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::pipeline::{Exchange, Flow, Stage};

#[derive(Debug, Clone, Copy)]
pub struct AccessLog {
    mode: Mode,
}

impl AccessLog {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }
}

/// Builds the per-request span.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpan {
    mode: Mode,
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        if self.mode.is_development() {
            return tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri()
            );
        }

        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id
        )
    }
}

pub type RequestTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    (),
    (),
    DefaultOnBodyChunk,
    DefaultOnEos,
    (),
>;

/// Span-only trace layer; the access event itself comes from [`AccessLog`]
/// and failures are logged by the error boundary.
pub fn trace_layer(mode: Mode) -> RequestTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan { mode })
        .on_request(())
        .on_response(())
        .on_failure(())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[async_trait]
impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access-log"
    }

    async fn on_request(&self, request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        Flow::Continue(request)
    }

    fn on_response(&self, exchange: &Exchange, response: &mut Response) {
        let status = response.status().as_u16();
        let latency_ms = exchange.started_at().elapsed().as_secs_f64() * 1000.0;
        let length = content_length(response.headers());

        metrics::record_request(exchange.method().as_str(), status, exchange.started_at());

        if self.mode.is_development() {
            tracing::info!(
                target: "access",
                method = %exchange.method(),
                url = %exchange.original_url(),
                status,
                latency_ms,
                content_length = ?length,
                "request"
            );
            return;
        }

        let user_agent = exchange
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info!(
            target: "access",
            remote_addr = ?exchange.peer_addr(),
            request_id = exchange.request_id().unwrap_or("-"),
            method = %exchange.method(),
            url = %exchange.original_url(),
            version = ?exchange.version(),
            status,
            latency_ms,
            content_length = ?length,
            user_agent,
            "request"
        );
    }
}
