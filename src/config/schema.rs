//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Execution mode (development or production).
    pub mode: Mode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Static asset serving.
    pub static_files: StaticFilesConfig,

    /// Request body parsing limits.
    pub body: BodyConfig,

    /// Feature routers served by upstream services.
    pub routers: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode; selects log verbosity and formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    /// Parse the value of `APP_ENV` (or `NODE_ENV`). Anything but `development` is production.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            Mode::Development
        } else {
            Mode::Production
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Mode::Development)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Cross-origin resource sharing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to read responses (exact match).
    pub origins: Vec<String>,

    /// Methods advertised to preflight requests.
    pub methods: Vec<String>,

    /// Request headers advertised to preflight requests.
    pub allowed_headers: Vec<String>,

    /// Allow cookies for allow-listed origins.
    pub credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: vec![
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:5173".to_string(),
                "https://skill-mingle-frontend-eight.vercel.app".to_string(),
            ],
            methods: ["GET", "POST", "PUT", "DELETE", "PATCH"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: ["Content-Type", "Authorization", "X-Frontend-Host"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            credentials: true,
            max_age_secs: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Only requests under this path prefix are counted.
    pub path_prefix: String,

    /// Maximum requests per client within one window.
    pub max_requests: u64,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Message returned once the limit is exceeded.
    pub message: String,

    /// Use the first `X-Forwarded-For` entry as client identity.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: "/api".to_string(),
            max_requests: 1000,
            window_secs: 60 * 60,
            message: "Too many requests from this IP, please try again in an hour!".to_string(),
            trust_proxy: false,
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Enable static file serving.
    pub enabled: bool,

    /// Directory holding public assets.
    pub directory: String,

    /// Requests under this prefix never hit the filesystem.
    pub excluded_prefix: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "public".to_string(),
            excluded_prefix: "/api".to_string(),
        }
    }
}

/// Body parsing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum JSON body size in bytes.
    pub json_limit_bytes: usize,

    /// Accept only objects and arrays at the top level.
    pub strict: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            json_limit_bytes: 10 * 1024,
            strict: true,
        }
    }
}

/// A feature router served by an upstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Mount prefix (e.g., "/api/users").
    pub prefix: String,

    /// Base URL of the upstream service (e.g., "http://127.0.0.1:4001").
    pub upstream: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time allowed for an upstream router to answer, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Default mount prefixes of the feature routers.
pub const FEATURE_PREFIXES: [&str; 8] = [
    "/api/hello",
    "/api/users",
    "/api/requests",
    "/api/chats",
    "/api/reviews",
    "/api/search",
    "/api/suggestions",
    "/api/genAI",
];
