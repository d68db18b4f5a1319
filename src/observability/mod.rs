//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every stage and router produces:
//!     → tracing events (structured fields)
//!         → logging.rs (subscriber: pretty in development, JSON in production)
//!     → access_log.rs (one `access` event per response)
//!     → metrics.rs (counters, histograms)
//!         → Prometheus scrape listener (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the `request` span
//! - Metrics are cheap (no-ops until an exporter is installed)

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{trace_layer, AccessLog};
pub use logging::init_tracing;
