//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! runtime. All types derive Serde traits for deserialization from config
//! files; every field has a default so a missing file still yields a
//! serving configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the request runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Listener settings (bind host/port, proxy trust).
    pub server: ServerConfig,

    /// Input and output size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Admission-control rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Request identifier handling.
    pub request_id: RequestIdConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Bind port. 0 asks the OS for an ephemeral port.
    pub port: u16,

    /// Trust X-Forwarded-For from the immediate peer when resolving the
    /// caller address.
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_proxy: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Size limits enforced at the request boundary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum request target (path + query) length.
    pub max_url_length: usize,

    /// Maximum number of request headers.
    pub max_header_count: usize,

    /// Maximum total header bytes (names + values).
    pub max_header_bytes: usize,

    /// Maximum response body size in bytes; larger responses become 413.
    pub max_response_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024, // 1MB
            max_url_length: 2048,
            max_header_count: 64,
            max_header_bytes: 16 * 1024,
            max_response_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Timeout configuration for various phases.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request deadline in milliseconds.
    pub request_ms: u64,

    /// Idle connection timeout in milliseconds.
    pub idle_ms: u64,

    /// Header-parse timeout in milliseconds.
    pub headers_ms: u64,

    /// Graceful-drain budget on shutdown, in milliseconds.
    pub shutdown_drain_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            idle_ms: 60_000,
            headers_ms: 5_000,
            shutdown_drain_ms: 10_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable the admission-control middleware.
    pub enabled: bool,

    /// Bucket capacity: requests allowed per window per key.
    pub max_requests: u32,

    /// Refill window in milliseconds.
    pub window_ms: u64,

    /// Maximum number of tracked keys; new keys past this are denied.
    pub max_keys: usize,

    /// Background eviction sweep interval in milliseconds.
    pub cleanup_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 60_000,
            max_keys: 10_000,
            cleanup_interval_ms: 30_000,
        }
    }
}

/// Request identifier handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestIdConfig {
    /// Header carrying the id on the wire.
    pub header_name: String,

    /// Generate an id when the header is absent.
    pub generate: bool,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header_name: "x-request-id".to_string(),
            generate: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
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
