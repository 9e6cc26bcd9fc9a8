//! Middleware pipeline.
//!
//! # Data Flow
//! ```text
//! pipeline.handle(ctx, terminal)
//!        │
//!        ▼
//! middleware[0].handle(ctx, next) ──┐ registration order inward
//!   middleware[1].handle(ctx, next) │
//!     ...                           │
//!       terminal.dispatch(ctx)      ▼
//!     ...                           ▲
//!   response transforms             │ reverse order outward
//! response                        ──┘
//! ```
//!
//! A middleware may call `next.run()` and transform the result, return its
//! own response without calling `next` (short-circuit), or propagate an
//! error with `?` (aborts the chain; the orchestrator converts it to a
//! 500). Registration happens at setup only.

use std::sync::Arc;

use async_trait::async_trait;

use crate::http::response::RuntimeResponse;
use crate::runtime::error::RuntimeError;

pub mod compression;
pub mod context;
pub mod rate_limit;
pub mod security_headers;

pub use context::{CancelFlag, RequestContext, RequestKind};

/// One layer of the chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<RuntimeResponse, RuntimeError>;
}

/// The innermost stage of the chain, run when every middleware has called
/// through. The orchestrator's handler dispatch implements this.
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn dispatch(&self, ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError>;
}

/// Continuation handed to each middleware.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    /// Invoke the remainder of the chain.
    pub async fn run(self, ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                head.handle(
                    ctx,
                    Next {
                        chain: rest,
                        terminal: self.terminal,
                    },
                )
                .await
            }
            None => self.terminal.dispatch(ctx).await,
        }
    }
}

/// Ordered middleware chain wrapping the final dispatch.
#[derive(Default)]
pub struct MiddlewarePipeline {
    chain: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. Setup-time only; the first registration wraps
    /// all later ones.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.chain.push(middleware);
    }

    /// Run the chain around `terminal` for one request.
    pub async fn handle(
        &self,
        ctx: &mut RequestContext,
        terminal: &dyn Terminal,
    ) -> Result<RuntimeResponse, RuntimeError> {
        Next {
            chain: &self.chain,
            terminal,
        }
        .run(ctx)
        .await
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::envelope::RequestEnvelope;
    use crate::routing::RouteMatch;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTerminal;

    #[async_trait]
    impl Terminal for EchoTerminal {
        async fn dispatch(&self, ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
            Ok(RuntimeResponse::ok_text(format!("handler:{}", ctx.handler)))
        }
    }

    struct Tagger {
        order: Arc<AtomicUsize>,
        name: &'static str,
    }

    #[async_trait]
    impl Middleware for Tagger {
        async fn handle(
            &self,
            ctx: &mut RequestContext,
            next: Next<'_>,
        ) -> Result<RuntimeResponse, RuntimeError> {
            let entered = self.order.fetch_add(1, Ordering::SeqCst);
            ctx.set_meta(format!("in:{}", self.name), entered.to_string());
            let resp = next.run(ctx).await?;
            Ok(resp.with_header(format!("x-out-{}", self.name), self.order.fetch_add(1, Ordering::SeqCst).to_string()))
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(
            &self,
            _ctx: &mut RequestContext,
            _next: Next<'_>,
        ) -> Result<RuntimeResponse, RuntimeError> {
            Ok(RuntimeResponse::rate_limited(1))
        }
    }

    struct Failing;

    #[async_trait]
    impl Middleware for Failing {
        async fn handle(
            &self,
            _ctx: &mut RequestContext,
            _next: Next<'_>,
        ) -> Result<RuntimeResponse, RuntimeError> {
            Err(RuntimeError::Middleware("boom".into()))
        }
    }

    fn ctx() -> RequestContext {
        let envelope = RequestEnvelope::new("id", "GET", "/x", HashMap::new(), "127.0.0.1");
        let route = RouteMatch {
            handler: "echo".into(),
            params: HashMap::new(),
        };
        RequestContext::new(envelope, RequestKind::Page, route, CancelFlag::new())
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_terminal() {
        let pipeline = MiddlewarePipeline::new();
        let mut ctx = ctx();
        let resp = pipeline.handle(&mut ctx, &EchoTerminal).await.unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_execution_order_in_then_reverse_out() {
        let order = Arc::new(AtomicUsize::new(0));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.push(Arc::new(Tagger { order: order.clone(), name: "outer" }));
        pipeline.push(Arc::new(Tagger { order: order.clone(), name: "inner" }));

        let mut ctx = ctx();
        let resp = pipeline.handle(&mut ctx, &EchoTerminal).await.unwrap();

        // Inward: outer=0, inner=1. Outward: inner=2, outer=3.
        assert_eq!(ctx.meta("in:outer"), Some("0"));
        assert_eq!(ctx.meta("in:inner"), Some("1"));
        assert_eq!(resp.header("x-out-inner"), Some("2"));
        assert_eq!(resp.header("x-out-outer"), Some("3"));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_terminal() {
        let order = Arc::new(AtomicUsize::new(0));
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.push(Arc::new(ShortCircuit));
        pipeline.push(Arc::new(Tagger { order, name: "never" }));

        let mut ctx = ctx();
        let resp = pipeline.handle(&mut ctx, &EchoTerminal).await.unwrap();
        assert_eq!(resp.status, 429);
        assert_eq!(ctx.meta("in:never"), None);
    }

    #[tokio::test]
    async fn test_error_aborts_chain() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.push(Arc::new(Failing));

        let mut ctx = ctx();
        assert!(pipeline.handle(&mut ctx, &EchoTerminal).await.is_err());
    }
}
