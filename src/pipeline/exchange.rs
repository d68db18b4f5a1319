//! Per-request context shared by the stages of one exchange.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, OriginalUri};
use axum::http::{Extensions, HeaderMap, Method, Request, Uri, Version};

use crate::http::request::X_REQUEST_ID;

/// Snapshot of the inbound request plus scratch space for stage notes.
///
/// Captured before the first stage runs, so response hooks see the request as
/// the client sent it even when a stage rewrote it.
#[derive(Debug)]
pub struct Exchange {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    peer_addr: Option<SocketAddr>,
    request_id: Option<String>,
    started_at: Instant,
    notes: Extensions,
}

impl Exchange {
    pub fn capture(request: &Request<Body>) -> Self {
        let uri = request
            .extensions()
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| request.uri().clone());
        let peer_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            method: request.method().clone(),
            uri,
            version: request.version(),
            headers: request.headers().clone(),
            peer_addr,
            request_id,
            started_at: Instant::now(),
            notes: Extensions::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URI as received, before any stage rewrote it.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Path and query as received (`/api/users?page=2`).
    pub fn original_url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Record a value for this exchange's response hooks.
    pub fn note<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.notes.insert(value);
    }

    pub fn get_note<T: Clone + Send + Sync + 'static>(&self) -> Option<&T> {
        self.notes.get::<T>()
    }
}

/// Path and query of a request, preferring the pre-rewrite URI.
pub fn original_url(request: &Request<Body>) -> String {
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or_else(|| request.uri());
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}
