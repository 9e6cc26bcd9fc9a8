//! Request-scoped context carried through the middleware chain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::http::envelope::RequestEnvelope;
use crate::routing::RouteMatch;

/// Cooperative cancellation flag.
///
/// Set by the orchestrator when the request deadline expires. Handlers are
/// expected to check it at convenient points; work that ignores it still
/// runs to completion and its result is discarded, never force-killed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Coarse request classification, decided before routing.
///
/// Drives response shaping: API callers get structured error bodies and
/// compressible JSON, probes stay plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Human-facing page.
    Page,
    /// Machine caller expecting JSON.
    Api,
    /// Health/liveness probe.
    Probe,
}

impl RequestKind {
    /// Classify from the envelope's path and Accept header.
    pub fn classify(envelope: &RequestEnvelope) -> Self {
        let path = envelope.path();
        if matches!(path, "/health" | "/live" | "/ready") {
            return RequestKind::Probe;
        }
        let wants_json = envelope
            .header("accept")
            .map(|a| a.contains("application/json"))
            .unwrap_or(false);
        if wants_json || path.starts_with("/status") {
            RequestKind::Api
        } else {
            RequestKind::Page
        }
    }
}

/// Mutable per-request metadata layered on top of the immutable envelope.
/// Lives for exactly one request and is discarded with the response.
#[derive(Debug)]
pub struct RequestContext {
    pub envelope: RequestEnvelope,
    pub kind: RequestKind,
    /// Handler name resolved by the router.
    pub handler: String,
    /// Parameters captured from the matched pattern.
    pub params: HashMap<String, String>,
    pub cancel: CancelFlag,
    meta: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(envelope: RequestEnvelope, kind: RequestKind, route: RouteMatch, cancel: CancelFlag) -> Self {
        Self {
            envelope,
            kind,
            handler: route.handler,
            params: route.params,
            cancel,
            meta: HashMap::new(),
        }
    }

    /// The request identifier, for log correlation.
    pub fn id(&self) -> &str {
        &self.envelope.id
    }

    /// Attach a metadata entry for downstream middleware.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}
