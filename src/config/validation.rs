//! Configuration validation.
//!
//! Semantic checks on top of what serde already guarantees syntactically.
//! Runs once at startup; any violation is fatal before the listener binds.

use thiserror::Error;

use crate::config::schema::RuntimeConfig;

/// One rejected configuration field.
#[derive(Debug, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

fn require(errors: &mut Vec<ValidationError>, ok: bool, field: &'static str, reason: &str) {
    if !ok {
        errors.push(ValidationError {
            field,
            reason: reason.to_string(),
        });
    }
}

/// Validate the full configuration. Collects every violation rather than
/// stopping at the first so the operator can fix them all in one pass.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    require(
        &mut errors,
        !config.server.host.is_empty(),
        "server.host",
        "must not be empty",
    );

    require(
        &mut errors,
        config.limits.max_body_bytes > 0,
        "limits.max_body_bytes",
        "must be positive",
    );
    require(
        &mut errors,
        config.limits.max_url_length > 0,
        "limits.max_url_length",
        "must be positive",
    );
    require(
        &mut errors,
        config.limits.max_header_count > 0,
        "limits.max_header_count",
        "must be positive",
    );
    require(
        &mut errors,
        config.limits.max_header_bytes > 0,
        "limits.max_header_bytes",
        "must be positive",
    );
    require(
        &mut errors,
        config.limits.max_response_bytes > 0,
        "limits.max_response_bytes",
        "must be positive",
    );

    require(
        &mut errors,
        config.timeouts.request_ms > 0,
        "timeouts.request_ms",
        "must be positive",
    );
    require(
        &mut errors,
        config.timeouts.idle_ms > 0,
        "timeouts.idle_ms",
        "must be positive",
    );
    require(
        &mut errors,
        config.timeouts.headers_ms > 0,
        "timeouts.headers_ms",
        "must be positive",
    );
    require(
        &mut errors,
        config.timeouts.shutdown_drain_ms > 0,
        "timeouts.shutdown_drain_ms",
        "must be positive",
    );

    if config.rate_limit.enabled {
        require(
            &mut errors,
            config.rate_limit.max_requests > 0,
            "rate_limit.max_requests",
            "must be positive",
        );
        require(
            &mut errors,
            config.rate_limit.window_ms > 0,
            "rate_limit.window_ms",
            "must be positive",
        );
        require(
            &mut errors,
            config.rate_limit.max_keys > 0,
            "rate_limit.max_keys",
            "must be positive",
        );
        require(
            &mut errors,
            config.rate_limit.cleanup_interval_ms > 0,
            "rate_limit.cleanup_interval_ms",
            "must be positive",
        );
    }

    require(
        &mut errors,
        !config.request_id.header_name.is_empty(),
        "request_id.header_name",
        "must not be empty",
    );

    if config.observability.metrics_enabled {
        require(
            &mut errors,
            config.observability.metrics_address.parse::<std::net::SocketAddr>().is_ok(),
            "observability.metrics_address",
            "must be a host:port socket address",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
