//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Add the protective response header set (stage 1)
//! - Add the cross-origin isolation headers (stage 5)
//! - Strip hop-by-hop headers and append X-Forwarded-For when forwarding
//!
//! # Design Decisions
//! - The protective set only fills headers a router did not set itself
//! - Isolation headers always overwrite; they are part of the response
//!   contract on every path and status

use std::net::IpAddr;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Request;
use axum::response::Response;

use crate::pipeline::{Exchange, Flow, Stage};

const PROTECTIVE_HEADERS: [(&str, &str); 12] = [
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Cross-origin isolation headers and their fixed values.
pub const ISOLATION_HEADERS: [(&str, &str); 3] = [
    ("cross-origin-resource-policy", "cross-origin"),
    ("cross-origin-opener-policy", "cross-origin"),
    ("cross-origin-embedder-policy", "require-corp"),
];

/// Stage 1: protective response headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityHeaders;

#[async_trait]
impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    async fn on_request(&self, request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        Flow::Continue(request)
    }

    fn on_response(&self, _exchange: &Exchange, response: &mut Response) {
        let headers = response.headers_mut();
        for (name, value) in PROTECTIVE_HEADERS {
            headers
                .entry(HeaderName::from_static(name))
                .or_insert(HeaderValue::from_static(value));
        }
        headers.remove("x-powered-by");
    }
}

/// Stage 5: cross-origin isolation headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct IsolationHeaders;

#[async_trait]
impl Stage for IsolationHeaders {
    fn name(&self) -> &'static str {
        "isolation-headers"
    }

    async fn on_request(&self, request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        Flow::Continue(request)
    }

    fn on_response(&self, _exchange: &Exchange, response: &mut Response) {
        let headers = response.headers_mut();
        for (name, value) in ISOLATION_HEADERS {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
    }
}

/// Remove connection-scoped headers, including those named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// Append `client` to `X-Forwarded-For`, keeping earlier hops.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}
