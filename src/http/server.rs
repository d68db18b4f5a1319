//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble the pipeline in its fixed stage order
//! - Mount the configured feature routers
//! - Wire up the request-id and trace layers around the pipeline
//! - Bind to a listener and serve until shutdown
//! - Prune expired rate-limit windows in the background

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::schema::FEATURE_PREFIXES;
use crate::config::AppConfig;
use crate::http::body::JsonBodyParser;
use crate::http::cookies::CookieParser;
use crate::http::request::{propagate_request_id, set_request_id};
use crate::http::static_files::StaticFiles;
use crate::observability::{trace_layer, AccessLog};
use crate::pipeline::{ErrorBoundary, Pipeline, PipelineService};
use crate::routing::{hello, AxumRoutes, RouterRegistry, UpstreamRoutes};
use crate::security::{
    Cors, IsolationHeaders, MemoryStore, RateLimit, RateLimitStore, Sanitizer, SecurityHeaders,
};

/// Mount the configured upstream routers, then the built-in hello router.
///
/// Configured mounts come first so a config entry can take over
/// `/api/hello`.
pub fn build_registry(config: &AppConfig) -> Result<RouterRegistry, url::ParseError> {
    let mut registry = RouterRegistry::new();

    for route in &config.routers {
        let upstream = UpstreamRoutes::from_config(route, &config.timeouts)?;
        registry.mount(&route.prefix, upstream);
        tracing::info!(prefix = %route.prefix, upstream = %route.upstream, "Upstream router mounted");
    }

    if !registry.is_mounted("/api/hello") {
        registry.mount("/api/hello", AxumRoutes::new(hello::routes()));
    }

    for prefix in FEATURE_PREFIXES {
        if !registry.is_mounted(prefix) {
            tracing::warn!(prefix, "No router configured, requests will get 404");
        }
    }

    Ok(registry)
}

/// Build the pipeline in its fixed order.
pub fn build_pipeline(
    config: &AppConfig,
    registry: RouterRegistry,
    store: Arc<dyn RateLimitStore>,
) -> Pipeline {
    Pipeline::builder(ErrorBoundary::new(config.mode))
        .stage(SecurityHeaders)
        .stage(Cors::new(&config.cors))
        .stage(AccessLog::new(config.mode))
        .stage_if(config.rate_limit.enabled, || {
            RateLimit::new(&config.rate_limit, store)
        })
        .stage(IsolationHeaders)
        .stage_if(config.static_files.enabled, || {
            StaticFiles::new(&config.static_files)
        })
        .stage(JsonBodyParser::new(&config.body))
        .stage(Sanitizer)
        .stage(CookieParser)
        .build(registry)
}

/// HTTP server for the application.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    /// Store whose expired windows this server prunes, when it owns one.
    pruned_store: Option<MemoryStore>,
}

impl HttpServer {
    /// Create a server with an in-process rate-limit store.
    pub fn new(config: AppConfig, registry: RouterRegistry) -> Self {
        let store = MemoryStore::new();
        let mut server = Self::with_rate_limit_store(config, registry, Arc::new(store.clone()));
        server.pruned_store = Some(store);
        server
    }

    /// Create a server counting requests in an external store.
    pub fn with_rate_limit_store(
        config: AppConfig,
        registry: RouterRegistry,
        store: Arc<dyn RateLimitStore>,
    ) -> Self {
        let pipeline = build_pipeline(&config, registry, store);
        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");

        let router = Router::new()
            .fallback_service(PipelineService::new(pipeline))
            .layer(trace_layer(config.mode))
            .layer(propagate_request_id())
            .layer(set_request_id());

        Self {
            router,
            config,
            pruned_store: None,
        }
    }

    /// The axum router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server, accepting connections until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = ?self.config.mode,
            "HTTP server starting"
        );

        let limiting = self.config.rate_limit.enabled;
        let pruner = self.pruned_store.filter(|_| limiting).map(|store| {
            let window = Duration::from_secs(self.config.rate_limit.window_secs);
            tokio::spawn(prune_windows(store, window))
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(pruner) = pruner {
            pruner.abort();
        }
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn prune_windows(store: MemoryStore, window: Duration) {
    let mut interval = tokio::time::interval(window);
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed = store.prune(window);
        if removed > 0 {
            tracing::debug!(removed, remaining = store.len(), "Pruned rate-limit windows");
        }
    }
}
