//! Fixed-window rate limiting per client (stage 4).
//!
//! # Responsibilities
//! - Count requests under a path prefix per client identity
//! - Reject requests beyond the window allowance with a fixed message
//! - Advertise the remaining allowance in `X-RateLimit-*` headers
//!
//! # Design Decisions
//! - Counters live in an injected [`RateLimitStore`], so a shared store can
//!   replace the in-memory one when running several instances
//! - Increment-and-compare happens under the per-key shard lock of the map
//! - Rejected requests still count, like every other request in the window
//! - Uses tokio's clock so tests can pause and advance time

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::observability::metrics;
use crate::pipeline::{Exchange, Flow, Stage};
use crate::routing::PathPrefix;

/// Window state after counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Requests counted in the current window, this one included.
    pub count: u64,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// Shared counting store keyed by client identity.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key` and report the window state.
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit, AppError>;

    /// Forget everything about `key`.
    async fn reset(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started: Instant,
}

/// In-process store backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    windows: Arc<DashMap<String, Window>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop windows older than `window`. Returns how many were removed.
    pub fn prune(&self, window: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<Hit, AppError> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(Window {
                count: 0,
                started: now,
            });

        if now.duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        entry.count += 1;

        Ok(Hit {
            count: entry.count,
            resets_in: window.saturating_sub(now.duration_since(entry.started)),
        })
    }

    async fn reset(&self, key: &str) {
        self.windows.remove(key);
    }
}

/// Identity used to scope counters: the peer IP, or the first
/// `X-Forwarded-For` hop when the proxy in front is trusted.
pub fn client_identity(request: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Allowance reported back to the client.
#[derive(Debug, Clone, Copy)]
struct Allowance {
    limit: u64,
    remaining: u64,
    resets_in: Duration,
    exceeded: bool,
}

pub struct RateLimit {
    scope: PathPrefix,
    max_requests: u64,
    window: Duration,
    message: String,
    trust_proxy: bool,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimit {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            scope: PathPrefix::new(config.path_prefix.as_str()),
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            message: config.message.clone(),
            trust_proxy: config.trust_proxy,
            store,
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[async_trait]
impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    async fn on_request(&self, request: Request<Body>, exchange: &mut Exchange) -> Flow {
        if !self.scope.matches(request.uri().path()) {
            return Flow::Continue(request);
        }

        let client = client_identity(&request, self.trust_proxy);
        let hit = match self.store.increment(&client, self.window).await {
            Ok(hit) => hit,
            Err(e) => return Flow::Fail(e),
        };

        let exceeded = hit.count > self.max_requests;
        exchange.note(Allowance {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(hit.count),
            resets_in: hit.resets_in,
            exceeded,
        });

        if exceeded {
            tracing::warn!(client = %client, count = hit.count, "Rate limit exceeded");
            metrics::record_rate_limited();
            return Flow::Fail(AppError::new(
                self.message.clone(),
                StatusCode::TOO_MANY_REQUESTS,
            ));
        }

        Flow::Continue(request)
    }

    fn on_response(&self, exchange: &Exchange, response: &mut Response) {
        let Some(allowance) = exchange.get_note::<Allowance>() else {
            return;
        };
        let reset = ceil_secs(allowance.resets_in);
        let headers = response.headers_mut();

        headers.insert("x-ratelimit-limit", HeaderValue::from(allowance.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(allowance.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(reset));
        if allowance.exceeded {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(reset));
        }
    }
}
