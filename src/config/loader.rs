//! Configuration loading from disk.

use std::path::Path;

use thiserror::Error;

use crate::config::schema::RuntimeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RuntimeConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
            [server]
            port = 9999

            [rate_limit]
            max_requests = 5
        "#;
        let config: RuntimeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.rate_limit.max_requests, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.timeouts.request_ms, 30_000);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let toml = r#"
            [limits]
            max_response_bytes = 0
        "#;
        let config: RuntimeConfig = toml::from_str(toml).unwrap();
        assert!(validate_config(&config).is_err());
    }
}
