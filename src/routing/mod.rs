//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request that passed every pipeline stage
//!     → registry.rs (prefix lookup, mount order)
//!     → matcher.rs (segment-aware, case-insensitive prefix match)
//!     → RouteHandler::handle with the prefix stripped
//!         hello.rs    (built-in axum router)
//!         upstream.rs (forward to another service)
//!     → Return: response, or AppError for the boundary
//!
//! No prefix matched:
//!     → AppError 404 "Can't find <url> on this server"
//! ```
//!
//! # Design Decisions
//! - Mounts fixed at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Feature routers are opaque: the registry never looks inside them

pub mod hello;
pub mod matcher;
pub mod registry;
pub mod upstream;

pub use matcher::PathPrefix;
pub use registry::{AxumRoutes, MountPrefix, RouteHandler, RouterRegistry};
pub use upstream::UpstreamRoutes;
