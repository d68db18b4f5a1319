//! Feature routers served by another process.
//!
//! # Responsibilities
//! - Forward the (prefix-stripped) request to the upstream base URL
//! - Add forwarding headers, strip hop-by-hop headers both ways
//! - Map transport failures to operational errors
//!
//! # Design Decisions
//! - No retries: a failed forward is reported once
//! - Upstream status codes pass through untouched; upstream error bodies are
//!   the router's own responses

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::Response;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::{RouteConfig, TimeoutConfig};
use crate::error::AppError;
use crate::routing::registry::{MountPrefix, RouteHandler};
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

pub const X_FORWARDED_PREFIX: &str = "x-forwarded-prefix";

/// Forwards requests to an upstream service.
#[derive(Clone)]
pub struct UpstreamRoutes {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:4001/v1`.
    base: String,
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl UpstreamRoutes {
    pub fn new(base: &str, timeouts: &TimeoutConfig) -> Result<Self, url::ParseError> {
        let base = Url::parse(base)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            base: base.as_str().trim_end_matches('/').to_string(),
            client,
            timeout: Duration::from_secs(timeouts.upstream_secs),
        })
    }

    pub fn from_config(route: &RouteConfig, timeouts: &TimeoutConfig) -> Result<Self, url::ParseError> {
        Self::new(&route.upstream, timeouts)
    }

    fn target(&self, path_and_query: &str) -> Result<Uri, AppError> {
        format!("{}{}", self.base, path_and_query)
            .parse::<Uri>()
            .map_err(AppError::internal)
    }
}

#[async_trait]
impl RouteHandler for UpstreamRoutes {
    async fn handle(&self, request: Request<Body>) -> Result<Response, AppError> {
        let prefix = request.extensions().get::<MountPrefix>().cloned();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        parts.uri = self.target(&path_and_query)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);
        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer.ip());
        }
        if let Some(MountPrefix(prefix)) = prefix {
            if let Ok(value) = HeaderValue::from_str(&prefix) {
                parts.headers.insert(X_FORWARDED_PREFIX, value);
            }
        }

        let target = parts.uri.to_string();
        let forwarded = Request::from_parts(parts, body);

        match tokio::time::timeout(self.timeout, self.client.request(forwarded)).await {
            Ok(Ok(response)) => {
                tracing::debug!(upstream = %target, status = %response.status(), "Upstream answered");
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => {
                tracing::error!(upstream = %target, error = %e, "Upstream request failed");
                Err(AppError::new(
                    "Service temporarily unavailable",
                    StatusCode::BAD_GATEWAY,
                ))
            }
            Err(_) => {
                tracing::warn!(upstream = %target, timeout = ?self.timeout, "Upstream timed out");
                Err(AppError::new(
                    "Upstream service timed out",
                    StatusCode::GATEWAY_TIMEOUT,
                ))
            }
        }
    }
}
