//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use request_runtime::config::RuntimeConfig;
use request_runtime::http::handlers::Handler;
use request_runtime::http::{RequestEnvelope, RuntimeResponse};
use request_runtime::middleware::RequestContext;
use request_runtime::runtime::error::RuntimeError;
use request_runtime::{Runtime, RuntimeState, StateManager, Telemetry};

/// An envelope from a fixed local caller.
pub fn envelope(method: &str, target: &str) -> RequestEnvelope {
    envelope_from("127.0.0.1", method, target)
}

/// An envelope from a specific caller address (rate-limit key).
#[allow(dead_code)]
pub fn envelope_from(addr: &str, method: &str, target: &str) -> RequestEnvelope {
    RequestEnvelope::new(
        format!("test-{}", uuid::Uuid::new_v4()),
        method,
        target,
        HashMap::new(),
        addr,
    )
}

/// A runtime with the stock wiring, transitioned to Ready.
#[allow(dead_code)]
pub fn ready_runtime(config: &RuntimeConfig) -> Arc<Runtime> {
    let state = Arc::new(StateManager::new());
    let telemetry = Arc::new(Telemetry::new());
    let (runtime, _) = Runtime::standard(config, state.clone(), telemetry);
    state.transition(RuntimeState::Ready);
    Arc::new(runtime)
}

/// Handler that sleeps before answering; ignores cancellation on purpose.
pub struct SleepyHandler(pub Duration);

#[async_trait]
impl Handler for SleepyHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        tokio::time::sleep(self.0).await;
        Ok(RuntimeResponse::ok_text("done"))
    }
}

/// Handler returning a body of the requested size.
#[allow(dead_code)]
pub struct FixedSizeHandler(pub usize);

#[async_trait]
impl Handler for FixedSizeHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        Ok(RuntimeResponse::ok_text("x".repeat(self.0)))
    }
}
