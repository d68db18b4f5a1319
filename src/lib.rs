//! Mingle gateway library.
//!
//! Composes the backend of the skill-exchange platform: a fixed pipeline of
//! cross-cutting stages, a registry of feature routers mounted by path
//! prefix, and a single error boundary every failure flows through.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──▶ request-id layers (http::request)
//!     ──▶ pipeline (pipeline)
//!           1 security headers   (security::headers)
//!           2 CORS               (security::cors)
//!           3 access log         (observability::access_log)
//!           4 rate limit         (security::rate_limit)
//!           5 isolation headers  (security::headers)
//!           6 static files       (http::static_files)
//!           7 JSON body          (http::body)
//!           8 sanitizer          (security::sanitize)
//!           9 cookies            (http::cookies)
//!     ──▶ router registry (routing)
//!           hello router, upstream routers
//!     ──▶ error boundary (pipeline::boundary)
//!     ◀── Client Response
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;

pub use config::AppConfig;
pub use error::AppError;
pub use http::{build_registry, HttpServer};
pub use lifecycle::Shutdown;
