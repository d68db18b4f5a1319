//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Exchange::capture (snapshot + per-request notes)
//!     → stage 1 .. stage N on_request, in registration order
//!         Continue(req) → next stage
//!         Respond(res)  → stop, res is the answer
//!         Fail(err)     → stop, boundary renders err
//!     → RouterRegistry::dispatch (if every stage continued)
//!         Ok(res)  → boundary.intercept (forwarded errors re-rendered)
//!         Err(err) → boundary.render
//!     → stage 1 .. stage N on_response, in registration order
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed at build time; the builder order is the policy
//! - Response hooks run for every stage, even those after the stage that
//!   stopped the request, so header policies hold on every response
//! - Hooks run in registration order: a later stage overwrites headers set
//!   by an earlier one
//! - Router panics are caught and become defects

pub mod boundary;
pub mod exchange;

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::OriginalUri;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};

use crate::error::AppError;
use crate::routing::RouterRegistry;

pub use boundary::{ErrorBoundary, GENERIC_ERROR_MESSAGE};
pub use exchange::Exchange;

/// Outcome of a stage's request hook.
pub enum Flow {
    /// Hand the (possibly modified) request to the next stage.
    Continue(Request<Body>),
    /// The stage produced the final response.
    Respond(Response),
    /// The stage failed the request; the boundary renders the error.
    Fail(AppError),
}

/// One cross-cutting unit of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn on_request(&self, request: Request<Body>, exchange: &mut Exchange) -> Flow;

    /// Decorate the outgoing response. Runs for every response.
    fn on_response(&self, _exchange: &Exchange, _response: &mut Response) {}
}

/// An ordered list of stages in front of a router registry.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    registry: RouterRegistry,
    boundary: ErrorBoundary,
}

impl Pipeline {
    pub fn builder(boundary: ErrorBoundary) -> PipelineBuilder {
        PipelineBuilder {
            stages: Vec::new(),
            boundary,
        }
    }

    /// Names of the registered stages, in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run one request through the pipeline. Never fails.
    pub async fn handle(&self, mut request: Request<Body>) -> Response {
        if request.extensions().get::<OriginalUri>().is_none() {
            let original = OriginalUri(request.uri().clone());
            request.extensions_mut().insert(original);
        }

        let mut exchange = Exchange::capture(&request);
        let mut response = self.run(request, &mut exchange).await;

        for stage in &self.stages {
            stage.on_response(&exchange, &mut response);
        }
        response
    }

    async fn run(&self, mut request: Request<Body>, exchange: &mut Exchange) -> Response {
        for stage in &self.stages {
            match stage.on_request(request, exchange).await {
                Flow::Continue(next) => request = next,
                Flow::Respond(response) => {
                    tracing::trace!(stage = stage.name(), "Stage answered the request");
                    return self.boundary.intercept(response);
                }
                Flow::Fail(error) => {
                    tracing::debug!(stage = stage.name(), error = %error, "Stage failed the request");
                    return self.boundary.render(&error);
                }
            }
        }

        match AssertUnwindSafe(self.registry.dispatch(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => self.boundary.intercept(response),
            Ok(Err(error)) => self.boundary.render(&error),
            Err(panic) => self.boundary.render(&AppError::from_panic(panic)),
        }
    }
}

/// Builder fixing the stage order.
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    boundary: ErrorBoundary,
}

impl PipelineBuilder {
    /// Append a stage; stages run in the order they are added.
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append a stage only when `enabled`.
    pub fn stage_if<S: Stage + 'static>(self, enabled: bool, stage: impl FnOnce() -> S) -> Self {
        if enabled {
            self.stage(stage())
        } else {
            self
        }
    }

    pub fn build(self, registry: RouterRegistry) -> Pipeline {
        Pipeline {
            stages: self.stages,
            registry,
            boundary: self.boundary,
        }
    }
}

/// Tower service adapter so the pipeline can sit behind axum.
#[derive(Clone)]
pub struct PipelineService {
    pipeline: Arc<Pipeline>,
}

impl PipelineService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

impl tower::Service<Request<Body>> for PipelineService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let pipeline = self.pipeline.clone();
        Box::pin(async move { Ok(pipeline.handle(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::routing::{AxumRoutes, RouteHandler};
    use axum::body::to_bytes;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::sync::Mutex;

    /// Records the order in which hooks ran.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        outcome: fn() -> Option<Flow>,
    }

    #[async_trait]
    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn on_request(&self, request: Request<Body>, _exchange: &mut Exchange) -> Flow {
            self.log.lock().unwrap().push(format!("req:{}", self.name));
            (self.outcome)().unwrap_or(Flow::Continue(request))
        }

        fn on_response(&self, _exchange: &Exchange, response: &mut Response) {
            self.log.lock().unwrap().push(format!("res:{}", self.name));
            response
                .headers_mut()
                .insert("x-last-stage", HeaderValue::from_static(self.name));
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, outcome: fn() -> Option<Flow>) -> Recorder {
        Recorder {
            name,
            log: log.clone(),
            outcome,
        }
    }

    fn pass() -> Option<Flow> {
        None
    }

    fn teapot() -> Option<Flow> {
        Some(Flow::Respond(StatusCode::IM_A_TEAPOT.into_response()))
    }

    fn refuse() -> Option<Flow> {
        Some(Flow::Fail(AppError::new("refused", StatusCode::FORBIDDEN)))
    }

    fn registry() -> RouterRegistry {
        let users = Router::new()
            .route("/", get(|| async { "all users" }))
            .route("/boom", get(|| async { panic!("kaboom") as () }))
            .route(
                "/forbidden",
                get(|| async { AppError::new("not yours", StatusCode::FORBIDDEN) }),
            );
        let mut registry = RouterRegistry::new();
        registry.mount("/api/users", AxumRoutes::new(users));
        registry
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_order_then_router() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production))
            .stage(recorder("a", &log, pass))
            .stage(recorder("b", &log, pass))
            .build(registry());

        let response = pipeline.handle(request("/api/users")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-last-stage"], "b");
        assert_eq!(body_string(response).await, "all users");
        assert_eq!(*log.lock().unwrap(), vec!["req:a", "req:b", "res:a", "res:b"]);
    }

    #[tokio::test]
    async fn test_respond_short_circuits_but_all_hooks_decorate() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production))
            .stage(recorder("a", &log, teapot))
            .stage(recorder("b", &log, pass))
            .build(registry());

        let response = pipeline.handle(request("/api/users")).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(*log.lock().unwrap(), vec!["req:a", "res:a", "res:b"]);
    }

    #[tokio::test]
    async fn test_fail_goes_to_boundary() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production))
            .stage(recorder("a", &log, refuse))
            .build(registry());

        let response = pipeline.handle(request("/api/users")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_string(response).await,
            r#"{"status":"fail","message":"refused"}"#
        );
    }

    #[tokio::test]
    async fn test_unmatched_path_is_404_with_original_url() {
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production)).build(registry());

        let response = pipeline.handle(request("/api/nonexistent?x=1")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_string(response).await,
            r#"{"status":"fail","message":"Can't find /api/nonexistent?x=1 on this server"}"#
        );
    }

    #[tokio::test]
    async fn test_unmatched_route_inside_router_names_full_url() {
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production)).build(registry());

        let response = pipeline.handle(request("/api/users/missing/deep")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_string(response).await,
            r#"{"status":"fail","message":"Can't find /api/users/missing/deep on this server"}"#
        );
    }

    #[tokio::test]
    async fn test_router_error_response_is_rendered_by_boundary() {
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production)).build(registry());

        let response = pipeline.handle(request("/api/users/forbidden")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_string(response).await,
            r#"{"status":"fail","message":"not yours"}"#
        );
    }

    #[tokio::test]
    async fn test_router_panic_is_generic_500() {
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production)).build(registry());

        let response = pipeline.handle(request("/api/users/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(response).await,
            format!(r#"{{"status":"error","message":"{GENERIC_ERROR_MESSAGE}"}}"#)
        );
    }

    #[tokio::test]
    async fn test_handler_error_from_route_handler() {
        struct Broken;

        #[async_trait]
        impl RouteHandler for Broken {
            async fn handle(&self, _request: Request<Body>) -> Result<Response, AppError> {
                Err(AppError::internal(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "db password is hunter2",
                )))
            }
        }

        let mut registry = RouterRegistry::new();
        registry.mount("/api/chats", Broken);
        let pipeline = Pipeline::builder(ErrorBoundary::new(Mode::Production)).build(registry);

        let response = pipeline.handle(request("/api/chats")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body_string(response).await.contains("hunter2"));
    }
}
