//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!        │
//!        ▼
//! loader (read + parse)
//!        │
//!        ▼
//! validation (semantic checks, fail fast)
//!        │
//!        ▼
//! RuntimeConfig (immutable for the process lifetime)
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LimitsConfig, ObservabilityConfig, RateLimitConfig, RequestIdConfig, RuntimeConfig,
    ServerConfig, TimeoutConfig,
};
