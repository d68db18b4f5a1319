//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): responses by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_rate_limited_total` (counter): requests rejected by the limiter
//! - `http_errors_total` (counter): boundary renders by kind
//!   (`operational` or `defect`)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its own scrape listener.
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started_at: Instant) {
    ::metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("http_request_duration_seconds")
        .record(started_at.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("http_rate_limited_total").increment(1);
}

pub fn record_error(operational: bool) {
    let kind = if operational { "operational" } else { "defect" };
    ::metrics::counter!("http_errors_total", "kind" => kind).increment(1);
}
