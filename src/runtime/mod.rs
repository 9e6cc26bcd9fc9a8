//! Request orchestrator.
//!
//! # Responsibilities
//! - Gate every envelope against the lifecycle state
//! - Race request processing against the per-request deadline
//! - Validate input at the boundary (URL length, headers, path safety)
//! - Run the middleware chain and dispatch to the named handler
//! - Translate every outcome into a well-formed response
//! - Record telemetry for each accepted request
//!
//! # Design Decisions
//! - Processing runs as a spawned task; on deadline expiry the shared
//!   cancellation flag is set and the task is abandoned, never killed.
//!   A handler that ignores the flag still finishes and its result is
//!   simply discarded
//! - Nothing below this boundary may terminate the process; execution
//!   errors are logged once, with the request id, and become a 500
//! - Oversized responses are computed in full before the 413 conversion
//! - API callers get structured JSON error bodies, everyone else text

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{LimitsConfig, RuntimeConfig};
use crate::http::envelope::RequestEnvelope;
use crate::http::handlers::{
    BadgeHandler, Handler, HandlerRegistry, HomeHandler, LivenessHandler, ReadinessHandler,
    StatusHandler,
};
use crate::http::response::{ResponseBody, RuntimeResponse};
use crate::lifecycle::state::StateManager;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::security_headers::SecurityHeaders;
use crate::middleware::compression::Compression;
use crate::middleware::{CancelFlag, Middleware, MiddlewarePipeline, RequestContext, RequestKind};
use crate::observability::metrics;
use crate::routing::Router;
use crate::telemetry::Telemetry;

pub mod error;

use error::RuntimeError;

/// The composition root: every subsystem plugs in here.
pub struct Runtime {
    state: Arc<StateManager>,
    telemetry: Arc<Telemetry>,
    router: Router,
    pipeline: MiddlewarePipeline,
    handlers: HandlerRegistry,
    limits: LimitsConfig,
    request_timeout: Duration,
}

impl Runtime {
    /// An empty runtime: no routes, no handlers, no middleware.
    pub fn new(
        config: &RuntimeConfig,
        state: Arc<StateManager>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            state,
            telemetry,
            router: Router::new(),
            pipeline: MiddlewarePipeline::new(),
            handlers: HandlerRegistry::new(),
            limits: config.limits.clone(),
            request_timeout: Duration::from_millis(config.timeouts.request_ms),
        }
    }

    /// The stock wiring: built-in routes and handlers, rate limiting (when
    /// enabled), compression, security headers. Returns the runtime and
    /// the rate limiter (so the caller can spawn its sweeper).
    pub fn standard(
        config: &RuntimeConfig,
        state: Arc<StateManager>,
        telemetry: Arc<Telemetry>,
    ) -> (Self, Option<Arc<RateLimiter>>) {
        let mut runtime = Self::new(config, state.clone(), telemetry.clone());

        runtime.register_route("GET", "/", "home");
        runtime.register_route("GET", "/health", "ready");
        runtime.register_route("GET", "/live", "live");
        runtime.register_route("GET", "/ready", "ready");
        runtime.register_route("GET", "/status", "status");
        runtime.register_route("GET", "/badge/:label/:value", "badge");

        runtime.register_handler("home", Arc::new(HomeHandler));
        runtime.register_handler("live", Arc::new(LivenessHandler::new(state.clone())));
        runtime.register_handler("ready", Arc::new(ReadinessHandler::new(state.clone())));
        runtime.register_handler("status", Arc::new(StatusHandler::new(state, telemetry)));
        runtime.register_handler("badge", Arc::new(BadgeHandler));

        let limiter = if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
            runtime.extend_pipeline(limiter.clone());
            Some(limiter)
        } else {
            None
        };
        runtime.extend_pipeline(Arc::new(Compression::new()));
        runtime.extend_pipeline(Arc::new(SecurityHeaders));

        (runtime, limiter)
    }

    /// Register a route pattern. Setup-time only.
    pub fn register_route(
        &mut self,
        method: impl Into<String>,
        pattern: impl Into<String>,
        handler: impl Into<String>,
    ) {
        self.router.register(method, pattern, handler);
    }

    /// Register a named handler. Setup-time only.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.register(name, handler);
    }

    /// Append middleware. Allowed after construction, before traffic; the
    /// `&mut` receiver keeps it impossible to call once the runtime is
    /// shared with the ingress.
    pub fn extend_pipeline(&mut self, middleware: Arc<dyn Middleware>) {
        self.pipeline.push(middleware);
    }

    /// Serve one envelope. Never panics, never returns a half-built
    /// response.
    pub async fn handle(self: &Arc<Self>, envelope: RequestEnvelope) -> RuntimeResponse {
        let kind = RequestKind::classify(&envelope);

        // Admission gate. Rejected envelopes are never counted in flight.
        if !self.state.can_accept_requests() {
            tracing::debug!(
                request_id = %envelope.id,
                state = self.state.current().as_str(),
                "Rejected request: not accepting traffic"
            );
            return shape_error(kind, RuntimeResponse::unavailable());
        }

        let started = Instant::now();
        self.telemetry.request_start();

        let method = envelope.method.clone();
        let request_id = envelope.id.clone();
        let cancel = CancelFlag::new();

        let mut worker = {
            let runtime = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { runtime.process(envelope, cancel).await })
        };

        let response = tokio::select! {
            joined = &mut worker => match joined {
                Ok(Ok(response)) => {
                    if response.body_len() > self.limits.max_response_bytes {
                        tracing::warn!(
                            request_id = %request_id,
                            response_bytes = response.body_len(),
                            limit = self.limits.max_response_bytes,
                            "Response exceeded size limit"
                        );
                        shape_error(kind, RuntimeResponse::payload_too_large())
                    } else {
                        response
                    }
                }
                Ok(Err(err)) => {
                    tracing::error!(request_id = %request_id, error = %err, "Request failed");
                    shape_error(kind, RuntimeResponse::internal_error())
                }
                Err(join_err) => {
                    tracing::error!(request_id = %request_id, error = %join_err, "Request task aborted");
                    shape_error(kind, RuntimeResponse::internal_error())
                }
            },
            _ = tokio::time::sleep(self.request_timeout) => {
                // Cooperative: the worker keeps the flag, not a kill switch.
                cancel.cancel();
                metrics::record_timeout();
                tracing::warn!(
                    request_id = %request_id,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Deadline exceeded; abandoning in-flight work"
                );
                shape_error(kind, RuntimeResponse::deadline_exceeded())
            }
        };

        metrics::record_request(&method, response.status, started);
        self.telemetry.request_end(started, response.body_len() as u64);
        response
    }

    /// Classification → boundary validation → route → middleware chain →
    /// dispatch.
    async fn process(
        &self,
        envelope: RequestEnvelope,
        cancel: CancelFlag,
    ) -> Result<RuntimeResponse, RuntimeError> {
        let kind = RequestKind::classify(&envelope);

        if let Some(rejection) = self.validate_boundary(&envelope) {
            return Ok(shape_error(kind, rejection));
        }

        let Some(route) = self.router.match_route(&envelope.method, envelope.path()) else {
            tracing::debug!(request_id = %envelope.id, path = envelope.path(), "No route matched");
            return Ok(shape_error(kind, RuntimeResponse::not_found()));
        };

        let mut ctx = RequestContext::new(envelope, kind, route, cancel);
        let response = self.pipeline.handle(&mut ctx, &self.handlers).await?;
        Ok(shape_error(kind, response))
    }

    /// Input checks that run before anything else touches the request.
    fn validate_boundary(&self, envelope: &RequestEnvelope) -> Option<RuntimeResponse> {
        if envelope.target.len() > self.limits.max_url_length {
            tracing::warn!(request_id = %envelope.id, length = envelope.target.len(), "URL too long");
            return Some(RuntimeResponse::uri_too_long());
        }

        if envelope.headers.len() > self.limits.max_header_count {
            tracing::warn!(request_id = %envelope.id, count = envelope.headers.len(), "Too many headers");
            return Some(RuntimeResponse::header_fields_too_large());
        }

        let header_bytes: usize = envelope.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        if header_bytes > self.limits.max_header_bytes {
            tracing::warn!(request_id = %envelope.id, bytes = header_bytes, "Headers too large");
            return Some(RuntimeResponse::header_fields_too_large());
        }

        if envelope.body_len() > self.limits.max_body_bytes {
            tracing::warn!(request_id = %envelope.id, bytes = envelope.body_len(), "Body too large");
            return Some(RuntimeResponse::payload_too_large());
        }

        if !path_is_safe(envelope.path()) {
            tracing::warn!(request_id = %envelope.id, path = envelope.path(), "Unsafe path rejected");
            return Some(RuntimeResponse::bad_request("Invalid request path"));
        }

        None
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }
}

/// Reject traversal segments, backslashes, and control bytes.
fn path_is_safe(path: &str) -> bool {
    if path.bytes().any(|b| b < 0x20 || b == 0x7f || b == b'\\') {
        return false;
    }
    !path.split('/').any(|segment| segment == "..")
}

/// Give API callers a structured error object; leave success responses and
/// non-API callers untouched.
fn shape_error(kind: RequestKind, response: RuntimeResponse) -> RuntimeResponse {
    if kind != RequestKind::Api || response.status < 400 {
        return response;
    }
    let message = match &response.body {
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Binary(_) => String::new(),
    };
    let status = response.status;
    let body = serde_json::json!({ "error": message, "status": status });
    response
        .with_header("content-type", "application/json")
        .with_body(ResponseBody::Text(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::state::RuntimeState;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct SleepyHandler(Duration);

    #[async_trait]
    impl Handler for SleepyHandler {
        async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
            tokio::time::sleep(self.0).await;
            Ok(RuntimeResponse::ok_text("finally"))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl Handler for FailingHandler {
        async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
            Err(RuntimeError::handler("failing", "synthetic fault"))
        }
    }

    struct HugeHandler(usize);

    #[async_trait]
    impl Handler for HugeHandler {
        async fn handle(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
            Ok(RuntimeResponse::ok_text("x".repeat(self.0)))
        }
    }

    fn envelope(method: &str, target: &str) -> RequestEnvelope {
        RequestEnvelope::new("test-req", method, target, HashMap::new(), "127.0.0.1")
    }

    async fn ready_runtime(config: RuntimeConfig) -> Arc<Runtime> {
        let state = Arc::new(StateManager::new());
        state.transition(RuntimeState::Ready);
        let telemetry = Arc::new(Telemetry::new());
        let (runtime, _) = Runtime::standard(&config, state, telemetry);
        Arc::new(runtime)
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let runtime = ready_runtime(RuntimeConfig::default()).await;
        let resp = runtime.handle(envelope("GET", "/nope")).await;
        assert_eq!(resp.status, 404);
        assert_eq!(runtime.telemetry().total(), 1);
        assert_eq!(runtime.telemetry().active(), 0);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_wrong_state_is_503_without_telemetry() {
        let state = Arc::new(StateManager::new()); // still Starting
        let telemetry = Arc::new(Telemetry::new());
        let (runtime, _) = Runtime::standard(&RuntimeConfig::default(), state, telemetry);
        let runtime = Arc::new(runtime);

        let resp = runtime.handle(envelope("GET", "/health")).await;
        assert_eq!(resp.status, 503);
        assert_eq!(runtime.telemetry().total(), 0);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_draining_refuses_new_requests() {
        let runtime = ready_runtime(RuntimeConfig::default()).await;
        runtime.state().transition(RuntimeState::Draining);
        let resp = runtime.handle(envelope("GET", "/")).await;
        assert_eq!(resp.status, 503);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_deadline_produces_504() {
        let mut config = RuntimeConfig::default();
        config.timeouts.request_ms = 50;
        config.rate_limit.enabled = false;

        let state = Arc::new(StateManager::new());
        state.transition(RuntimeState::Ready);
        let telemetry = Arc::new(Telemetry::new());
        let mut runtime = Runtime::new(&config, state, telemetry);
        runtime.register_route("GET", "/slow", "slow");
        runtime.register_handler("slow", Arc::new(SleepyHandler(Duration::from_secs(5))));
        let runtime = Arc::new(runtime);

        let started = Instant::now();
        let resp = runtime.handle(envelope("GET", "/slow")).await;
        assert_eq!(resp.status, 504);
        assert!(started.elapsed() < Duration::from_secs(2));
        // The abandoned worker no longer counts as in flight.
        assert_eq!(runtime.telemetry().active(), 0);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_handler_error_is_500() {
        let mut config = RuntimeConfig::default();
        config.rate_limit.enabled = false;

        let state = Arc::new(StateManager::new());
        state.transition(RuntimeState::Ready);
        let telemetry = Arc::new(Telemetry::new());
        let mut runtime = Runtime::new(&config, state, telemetry);
        runtime.register_route("GET", "/boom", "boom");
        runtime.register_handler("boom", Arc::new(FailingHandler));
        let runtime = Arc::new(runtime);

        let resp = runtime.handle(envelope("GET", "/boom")).await;
        assert_eq!(resp.status, 500);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_oversized_response_becomes_413() {
        let mut config = RuntimeConfig::default();
        config.limits.max_response_bytes = 1024;
        config.rate_limit.enabled = false;

        let state = Arc::new(StateManager::new());
        state.transition(RuntimeState::Ready);
        let telemetry = Arc::new(Telemetry::new());
        let mut runtime = Runtime::new(&config, state, telemetry);
        runtime.register_route("GET", "/big", "big");
        runtime.register_handler("big", Arc::new(HugeHandler(4096)));
        let runtime = Arc::new(runtime);

        let resp = runtime.handle(envelope("GET", "/big")).await;
        assert_eq!(resp.status, 413);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_unsafe_path_rejected_before_routing() {
        let runtime = ready_runtime(RuntimeConfig::default()).await;
        let resp = runtime.handle(envelope("GET", "/static/../../etc/passwd")).await;
        assert_eq!(resp.status, 400);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_oversized_url_rejected() {
        let mut config = RuntimeConfig::default();
        config.limits.max_url_length = 16;
        let runtime = ready_runtime(config).await;
        let resp = runtime.handle(envelope("GET", "/this/is/definitely/longer")).await;
        assert_eq!(resp.status, 414);
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_api_errors_are_json() {
        let runtime = ready_runtime(RuntimeConfig::default()).await;
        let mut env = envelope("GET", "/missing");
        env.headers.insert("accept".to_string(), "application/json".to_string());
        let resp = runtime.handle(env).await;
        assert_eq!(resp.status, 404);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        match &resp.body {
            ResponseBody::Text(text) => {
                let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
                assert_eq!(parsed["status"], 404);
            }
            _ => panic!("expected text body"),
        }
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_rate_limit_end_to_end() {
        let mut config = RuntimeConfig::default();
        config.rate_limit.max_requests = 1;
        config.rate_limit.window_ms = 1000;
        let runtime = ready_runtime(config).await;

        let first = runtime.handle(envelope("GET", "/")).await;
        assert_eq!(first.status, 200);

        let second = runtime.handle(envelope("GET", "/")).await;
        assert_eq!(second.status, 429);
        assert_eq!(second.header("retry-after"), Some("1"));
        runtime.telemetry().shutdown();
    }

    #[tokio::test]
    async fn test_badge_route_params_flow_through() {
        let runtime = ready_runtime(RuntimeConfig::default()).await;
        let resp = runtime.handle(envelope("GET", "/badge/build/passing")).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("image/svg+xml"));
        runtime.telemetry().shutdown();
    }
}
