//! Runtime error taxonomy.
//!
//! Admission refusals (wrong lifecycle state, rate limit) and input
//! rejections are modeled as responses, never as errors. This type only
//! carries execution failures that bubble up to the orchestrator boundary,
//! where they are logged once and converted to a 500.

use thiserror::Error;

/// An execution failure inside a handler or middleware.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A business handler failed.
    #[error("handler '{name}' failed: {reason}")]
    Handler { name: String, reason: String },

    /// A middleware layer failed.
    #[error("middleware failed: {0}")]
    Middleware(String),

    /// Response body serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    pub fn handler(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handler {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
