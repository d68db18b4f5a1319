//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs   SecurityHeaders (stage 1, response side)
//!     → cors.rs      Cors (stage 2, answers preflights)
//!     → rate_limit.rs RateLimit (stage 4, per-client window)
//!     → headers.rs   IsolationHeaders (stage 5, response side)
//!     → sanitize.rs  Sanitizer (stage 8, after body parsing)
//! ```
//!
//! # Design Decisions
//! - Every concern is a pipeline stage; ordering lives in the server
//! - Rejections become operational errors, never hand-written bodies
//! - No trust in client input

pub mod cors;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;

pub use cors::Cors;
pub use headers::{IsolationHeaders, SecurityHeaders};
pub use rate_limit::{MemoryStore, RateLimit, RateLimitStore};
pub use sanitize::Sanitizer;
