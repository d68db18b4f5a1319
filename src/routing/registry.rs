//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store mounted feature routers by prefix
//! - Hand matching requests to their router with the prefix stripped
//! - Turn unmatched requests into a 404 [`AppError`]
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan in mount order (first mount wins)
//! - Explicit not-found error rather than silent default

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::OriginalUri;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Uri};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use crate::error::AppError;
use crate::pipeline::exchange::original_url;
use crate::routing::matcher::PathPrefix;

/// A feature router: takes a request, answers it or forwards an error.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: Request<Body>) -> Result<Response, AppError>;
}

/// Request extension naming the prefix the request was dispatched under.
#[derive(Debug, Clone)]
pub struct MountPrefix(pub String);

struct Mount {
    prefix: PathPrefix,
    handler: Arc<dyn RouteHandler>,
}

/// Static mapping from path prefixes to feature routers.
#[derive(Default)]
pub struct RouterRegistry {
    mounts: Vec<Mount>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount<H: RouteHandler + 'static>(&mut self, prefix: &str, handler: H) -> &mut Self {
        tracing::debug!(prefix = %prefix, "Router mounted");
        self.mounts.push(Mount {
            prefix: PathPrefix::new(prefix),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn is_mounted(&self, prefix: &str) -> bool {
        let wanted = PathPrefix::new(prefix);
        self.mounts
            .iter()
            .any(|m| m.prefix.as_str().eq_ignore_ascii_case(wanted.as_str()))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(|m| m.prefix.as_str())
    }

    pub async fn dispatch(&self, mut request: Request<Body>) -> Result<Response, AppError> {
        let path = request.uri().path().to_string();

        for mount in &self.mounts {
            if let Some(rest) = mount.prefix.strip(&path) {
                let uri = relative_uri(request.uri(), rest)?;
                *request.uri_mut() = uri;
                request
                    .extensions_mut()
                    .insert(MountPrefix(mount.prefix.as_str().to_string()));
                return mount.handler.handle(request).await;
            }
        }

        Err(AppError::not_found(&original_url(&request)))
    }
}

/// Replace the path of `uri` with `rest`, keeping the query.
fn relative_uri(uri: &Uri, rest: &str) -> Result<Uri, AppError> {
    let path = if rest.is_empty() { "/" } else { rest };
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>().map_err(AppError::internal)?);
    Uri::from_parts(parts).map_err(AppError::internal)
}

/// Adapter mounting an axum [`Router`] as a feature router.
///
/// Paths the router does not know, and methods a known path does not
/// handle, fall back to the same 404 error the registry produces, naming the
/// full original URL.
#[derive(Clone)]
pub struct AxumRoutes {
    router: Router,
}

impl AxumRoutes {
    pub fn new(router: Router) -> Self {
        Self {
            router: router
                .fallback(forward_not_found)
                .method_not_allowed_fallback(forward_not_found),
        }
    }
}

async fn forward_not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    AppError::not_found(&url)
}

#[async_trait]
impl RouteHandler for AxumRoutes {
    async fn handle(&self, request: Request<Body>) -> Result<Response, AppError> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .map_err(|never| match never {})
    }
}
