//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the filter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration: one listener, any number of proxy routes.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Proxy routes, evaluated in declaration order.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Per-route forwarding policy. Immutable for the process lifetime.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier used as the tag on every log line.
    pub name: String,

    /// Upstream base URL (e.g., "https://backend.example.com").
    pub target: String,

    /// Header used as the shared-secret route selector.
    #[serde(default = "default_header_key")]
    pub header_key: String,

    /// Required value of the selector header. Must be non-empty.
    pub header_value: String,

    /// Path prefix this route accepts. Requests not matching fall through
    /// to the next handler.
    pub url_prefix: Option<String>,

    /// Strip the matched prefix from the forwarded path.
    #[serde(default)]
    pub remove_prefix_on_forward: bool,

    /// Headers injected into the upstream request, as "key: value" strings,
    /// applied in order. A later entry overwrites an earlier one with the
    /// same key.
    #[serde(default)]
    pub extra_headers: Vec<String>,

    /// Optional per-client rate limit.
    pub rate_limit: Option<RateLimitConfig>,

    /// Bounds upstream connection establishment and total response time,
    /// in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Initial capacity of the response capture buffer, in bytes.
    #[serde(default = "default_buffer_bytes")]
    pub buffer_bytes: usize,

    /// Skip upstream TLS certificate verification.
    #[serde(default)]
    pub allow_insecure_tls: bool,

    /// Emit a log line for each forwarded request.
    #[serde(default = "default_true")]
    pub log_request: bool,

    /// Emit a log line for each upstream response.
    #[serde(default = "default_true")]
    pub log_response: bool,
}

/// Fixed-window rate limit: at most `max_requests` per client per window.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Window length in seconds.
    pub window_seconds: u64,

    /// Maximum requests per client within one window.
    pub max_requests: u32,
}

fn default_header_key() -> String {
    "x-reverse-proxy".to_string()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_buffer_bytes() -> usize {
    16 * 1024
}

fn default_true() -> bool {
    true
}
