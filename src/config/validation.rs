//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and windows > 0, addresses parse)
//! - Detect conflicting router prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),
    #[error("invalid CORS origin `{0}`")]
    CorsOrigin(String),
    #[error("invalid CORS method `{0}`")]
    CorsMethod(String),
    #[error("rate_limit.{0} must be greater than zero")]
    RateLimitZero(&'static str),
    #[error("rate_limit.path_prefix must start with `/`")]
    RateLimitPrefix,
    #[error("body.json_limit_bytes must be greater than zero")]
    BodyLimitZero,
    #[error("router prefix `{0}` must start with `/`")]
    RouterPrefix(String),
    #[error("router prefix `{0}` is mounted more than once")]
    DuplicateRouter(String),
    #[error("upstream `{0}` is not an http URL")]
    Upstream(String),
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    for origin in &config.cors.origins {
        if !is_origin(origin) {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }

    for method in &config.cors.methods {
        if method.parse::<axum::http::Method>().is_err() {
            errors.push(ValidationError::CorsMethod(method.clone()));
        }
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled {
        if rate_limit.max_requests == 0 {
            errors.push(ValidationError::RateLimitZero("max_requests"));
        }
        if rate_limit.window_secs == 0 {
            errors.push(ValidationError::RateLimitZero("window_secs"));
        }
        if !rate_limit.path_prefix.starts_with('/') {
            errors.push(ValidationError::RateLimitPrefix);
        }
    }

    if config.body.json_limit_bytes == 0 {
        errors.push(ValidationError::BodyLimitZero);
    }

    let mut seen = HashSet::new();
    for route in &config.routers {
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::RouterPrefix(route.prefix.clone()));
        }
        if !seen.insert(route.prefix.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateRouter(route.prefix.clone()));
        }
        match Url::parse(&route.upstream) {
            Ok(url) if url.scheme() == "http" && url.host().is_some() => {}
            _ => errors.push(ValidationError::Upstream(route.upstream.clone())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin is `scheme://host[:port]` with nothing after the authority.
fn is_origin(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host().is_some()
                && url.path() == "/"
                && !value.ends_with('/')
                && url.query().is_none()
        }
        Err(_) => false,
    }
}
