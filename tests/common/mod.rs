//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use mingle_gateway::config::{AppConfig, RouteConfig};
use mingle_gateway::lifecycle::Shutdown;
use mingle_gateway::routing::RouterRegistry;
use mingle_gateway::{build_registry, HttpServer};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

/// A running server; shuts down when dropped.
pub struct TestApp {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Defaults minus the filesystem, so tests do not depend on `./public`.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.static_files.enabled = false;
    config
}

/// Config with `prefix` forwarded to `upstream`.
pub fn config_with_upstream(prefix: &str, upstream: SocketAddr) -> AppConfig {
    let mut config = test_config();
    config.routers.push(RouteConfig {
        prefix: prefix.to_string(),
        upstream: format!("http://{upstream}"),
    });
    config
}

pub async fn spawn_app(config: AppConfig) -> TestApp {
    let registry = build_registry(&config).unwrap();
    spawn_app_with(config, registry).await
}

pub async fn spawn_app_with(config: AppConfig, registry: RouterRegistry) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, registry);
    tokio::spawn(server.run(listener, shutdown.wait()));

    TestApp { addr, shutdown }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    serve(Router::new().fallback(echo)).await
}

async fn echo(request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();

    let headers: Map<String, Value> = parts
        .headers
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or_default())))
        .collect();

    axum::Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&bytes),
    }))
    .into_response()
}

/// Start a programmable backend; `f` decides status and body per request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let f = Arc::new(f);
    let router = Router::new().fallback(move |_request: Request<Body>| {
        let f = f.clone();
        async move {
            let (status, body) = f().await;
            (StatusCode::from_u16(status).unwrap_or(StatusCode::OK), body)
        }
    });
    serve(router).await
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
