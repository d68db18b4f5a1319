//! Public asset serving (stage 6).
//!
//! GET and HEAD requests outside the excluded prefix are looked up in the
//! public directory. A miss hands the untouched request to the next stage.

use std::path::Path;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::config::StaticFilesConfig;
use crate::http::request::without_body;
use crate::pipeline::{Exchange, Flow, Stage};
use crate::routing::PathPrefix;

#[derive(Debug, Clone)]
pub struct StaticFiles {
    dir: ServeDir,
    excluded: PathPrefix,
}

impl StaticFiles {
    pub fn new(config: &StaticFilesConfig) -> Self {
        let root = Path::new(&config.directory);
        if !root.is_dir() {
            tracing::warn!(directory = %config.directory, "Public directory not found");
        }
        Self {
            dir: ServeDir::new(root),
            excluded: PathPrefix::new(config.excluded_prefix.as_str()),
        }
    }

    fn wants(&self, request: &Request<Body>) -> bool {
        matches!(*request.method(), Method::GET | Method::HEAD)
            && !self.excluded.matches(request.uri().path())
    }
}

#[async_trait]
impl Stage for StaticFiles {
    fn name(&self) -> &'static str {
        "static-files"
    }

    async fn on_request(&self, request: Request<Body>, _exchange: &mut Exchange) -> Flow {
        if !self.wants(&request) {
            return Flow::Continue(request);
        }

        let response = match self.dir.clone().oneshot(without_body(&request)).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if response.status() == StatusCode::NOT_FOUND {
            return Flow::Continue(request);
        }
        tracing::trace!(path = %request.uri().path(), status = %response.status(), "Served static file");
        Flow::Respond(response.map(Body::new))
    }
}
