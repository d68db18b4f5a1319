//! Cross-origin resource sharing policy (stage 2).
//!
//! # Responsibilities
//! - Build a `tower_http` [`CorsLayer`] from [`CorsConfig`]
//! - Answer every OPTIONS request as a preflight, on any path
//! - Apply the policy's headers to every other response
//!
//! # Design Decisions
//! - Origins match exactly (scheme, host and port) through an origin list
//! - Credentials are granted only to allow-listed origins
//! - The layer wraps a no-op service so the policy runs at its place in the
//!   pipeline instead of around the whole router

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::{Layer, ServiceExt};
use tower_http::cors::{AllowCredentials, CorsLayer};

use crate::config::CorsConfig;
use crate::http::request::without_body;
use crate::pipeline::{Exchange, Flow, Stage};

/// Build a Tower CORS layer from configuration.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let methods: Vec<Method> = config
        .methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(origins.clone())
        .allow_methods(methods)
        .allow_headers(headers);

    if config.credentials {
        layer = layer.allow_credentials(AllowCredentials::predicate(move |origin, _| {
            origins.contains(origin)
        }));
    }

    if let Some(secs) = config.max_age_secs {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    layer
}

async fn no_content(_request: Request<Body>) -> Result<Response, Infallible> {
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Headers the policy produced for a non-preflight request.
#[derive(Debug, Clone)]
struct CorsHeaders(HeaderMap);

#[derive(Debug, Clone)]
pub struct Cors {
    layer: CorsLayer,
}

impl Cors {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            layer: cors_layer(config),
        }
    }

    async fn evaluate(&self, request: Request<Body>) -> Response {
        let service = self.layer.layer(tower::service_fn(no_content));
        match service.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

#[async_trait]
impl Stage for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn on_request(&self, request: Request<Body>, exchange: &mut Exchange) -> Flow {
        if request.method() == Method::OPTIONS {
            let mut response = self.evaluate(request).await;
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            return Flow::Respond(response);
        }

        let policy = self.evaluate(without_body(&request)).await;
        exchange.note(CorsHeaders(policy.headers().clone()));
        Flow::Continue(request)
    }

    fn on_response(&self, exchange: &Exchange, response: &mut Response) {
        let Some(CorsHeaders(policy)) = exchange.get_note::<CorsHeaders>() else {
            return;
        };
        let headers = response.headers_mut();
        for (name, value) in policy {
            if *name == header::VARY {
                headers.append(name.clone(), value.clone());
            } else {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}
