//! Business handler registry and built-in handlers.
//!
//! # Responsibilities
//! - Map handler names (as registered with the router) to implementations
//! - Ship the stock endpoints: home page, liveness/readiness text,
//!   JSON status backed by the telemetry snapshot, demo badge
//!
//! # Design Decisions
//! - Dispatch is a plain name lookup; an unknown name is a 404 response,
//!   not an error
//! - Handlers receive the request context and may observe the cooperative
//!   cancellation flag

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::response::RuntimeResponse;
use crate::lifecycle::state::StateManager;
use crate::middleware::{RequestContext, Terminal};
use crate::runtime::error::RuntimeError;
use crate::telemetry::Telemetry;

/// A named business handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError>;
}

/// Name → handler lookup table. Populated at setup, read-only afterward.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

#[async_trait]
impl Terminal for HandlerRegistry {
    async fn dispatch(&self, ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        match self.handlers.get(&ctx.handler) {
            Some(handler) => handler.handle(ctx).await,
            None => {
                tracing::warn!(request_id = %ctx.id(), handler = %ctx.handler, "Unknown handler name");
                Ok(RuntimeResponse::not_found())
            }
        }
    }
}

/// Plain-text landing page.
pub struct HomeHandler;

#[async_trait]
impl Handler for HomeHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        Ok(RuntimeResponse::ok_text(format!(
            "{} v{}\n\nEndpoints:\n  GET /health\n  GET /live\n  GET /ready\n  GET /status\n  GET /badge/:label/:value\n",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )))
    }
}

/// Liveness probe: text, 200 while the runtime has not reached Stopping.
pub struct LivenessHandler {
    state: Arc<StateManager>,
}

impl LivenessHandler {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Handler for LivenessHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        Ok(RuntimeResponse::ok_text(if self.state.is_alive() { "alive" } else { "stopping" }))
    }
}

/// Readiness probe: reports the current lifecycle state as text.
pub struct ReadinessHandler {
    state: Arc<StateManager>,
}

impl ReadinessHandler {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Handler for ReadinessHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        Ok(RuntimeResponse::ok_text(self.state.current().as_str()))
    }
}

/// JSON status endpoint backed by the cached telemetry snapshot.
pub struct StatusHandler {
    state: Arc<StateManager>,
    telemetry: Arc<Telemetry>,
}

impl StatusHandler {
    pub fn new(state: Arc<StateManager>, telemetry: Arc<Telemetry>) -> Self {
        Self { state, telemetry }
    }
}

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        let snapshot = self.telemetry.get_snapshot();
        let body = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "state": self.state.current().as_str(),
            "telemetry": snapshot,
        });
        Ok(RuntimeResponse::ok_json(&body))
    }
}

/// Demo badge: renders a flat SVG from the captured route parameters.
pub struct BadgeHandler;

#[async_trait]
impl Handler for BadgeHandler {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        let label = ctx.params.get("label").cloned().unwrap_or_default();
        let value = ctx.params.get("value").cloned().unwrap_or_default();

        // Escape the four characters that matter inside SVG text nodes.
        let escape = |s: &str| {
            s.replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
                .replace('"', "&quot;")
        };
        let (label, value) = (escape(&label), escape(&value));

        let label_width = 10 + label.len() * 7;
        let value_width = 10 + value.len() * 7;
        let svg = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="20">"#,
                r##"<rect width="{lw}" height="20" fill="#555"/>"##,
                r##"<rect x="{lw}" width="{vw}" height="20" fill="#4c1"/>"##,
                r##"<text x="{lx}" y="14" fill="#fff" font-family="monospace" font-size="11" text-anchor="middle">{label}</text>"##,
                r##"<text x="{vx}" y="14" fill="#fff" font-family="monospace" font-size="11" text-anchor="middle">{value}</text>"##,
                "</svg>"
            ),
            w = label_width + value_width,
            lw = label_width,
            vw = value_width,
            lx = label_width / 2,
            vx = label_width + value_width / 2,
            label = label,
            value = value,
        );

        Ok(RuntimeResponse::ok_text(svg).with_header("content-type", "image/svg+xml"))
    }
}
