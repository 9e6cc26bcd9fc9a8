//! Response compression middleware.
//!
//! Stateless gzip of text responses when the client advertises support and
//! the body clears a size threshold. Binary bodies are left alone (badges
//! and images are already compact); so are responses a downstream layer
//! already encoded.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;

use crate::http::response::{ResponseBody, RuntimeResponse};
use crate::middleware::{Middleware, Next, RequestContext};
use crate::runtime::error::RuntimeError;

/// Bodies below this size are not worth the encoder round trip.
const DEFAULT_MIN_BYTES: usize = 1024;

pub struct Compression {
    min_bytes: usize,
}

impl Compression {
    pub fn new() -> Self {
        Self {
            min_bytes: DEFAULT_MIN_BYTES,
        }
    }

    pub fn with_min_bytes(min_bytes: usize) -> Self {
        Self { min_bytes }
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for Compression {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<RuntimeResponse, RuntimeError> {
        let accepts_gzip = ctx
            .envelope
            .header("accept-encoding")
            .map(|v| v.contains("gzip"))
            .unwrap_or(false);

        let response = next.run(ctx).await?;

        if !accepts_gzip || response.header("content-encoding").is_some() {
            return Ok(response);
        }

        let text = match &response.body {
            ResponseBody::Text(text) if text.len() >= self.min_bytes => text,
            _ => return Ok(response),
        };

        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder
            .write_all(text.as_bytes())
            .and_then(|_| encoder.finish())
            .map(|compressed| {
                if compressed.len() >= text.len() {
                    return response.clone();
                }
                response
                    .clone()
                    .with_body(ResponseBody::Binary(Bytes::from(compressed)))
                    .with_header("content-encoding", "gzip")
                    .with_header("vary", "accept-encoding")
            })
            .map_err(|e| RuntimeError::Middleware(format!("gzip encoding failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::envelope::RequestEnvelope;
    use crate::middleware::{CancelFlag, MiddlewarePipeline, RequestKind, Terminal};
    use crate::routing::RouteMatch;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct BigBody;

    #[async_trait]
    impl Terminal for BigBody {
        async fn dispatch(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
            Ok(RuntimeResponse::ok_text("abcdefgh".repeat(512)))
        }
    }

    async fn run(accept_encoding: Option<&str>) -> RuntimeResponse {
        let mut headers = HashMap::new();
        if let Some(enc) = accept_encoding {
            headers.insert("accept-encoding".to_string(), enc.to_string());
        }
        let envelope = RequestEnvelope::new("id", "GET", "/page", headers, "127.0.0.1");
        let route = RouteMatch {
            handler: "page".into(),
            params: HashMap::new(),
        };
        let mut ctx = RequestContext::new(envelope, RequestKind::Page, route, CancelFlag::new());

        let mut pipeline = MiddlewarePipeline::new();
        pipeline.push(Arc::new(Compression::new()));
        pipeline.handle(&mut ctx, &BigBody).await.unwrap()
    }

    #[tokio::test]
    async fn test_compresses_when_advertised() {
        let resp = run(Some("gzip, deflate")).await;
        assert_eq!(resp.header("content-encoding"), Some("gzip"));
        assert!(resp.body_len() < 8 * 512);
        assert!(matches!(resp.body, ResponseBody::Binary(_)));
    }

    #[tokio::test]
    async fn test_skips_without_accept_encoding() {
        let resp = run(None).await;
        assert!(resp.header("content-encoding").is_none());
        assert_eq!(resp.body_len(), 8 * 512);
    }

    #[tokio::test]
    async fn test_skips_small_bodies() {
        struct SmallBody;

        #[async_trait]
        impl Terminal for SmallBody {
            async fn dispatch(&self, _ctx: &mut RequestContext) -> Result<RuntimeResponse, RuntimeError> {
                Ok(RuntimeResponse::ok_text("tiny"))
            }
        }

        let mut headers = HashMap::new();
        headers.insert("accept-encoding".to_string(), "gzip".to_string());
        let envelope = RequestEnvelope::new("id", "GET", "/page", headers, "127.0.0.1");
        let route = RouteMatch {
            handler: "page".into(),
            params: HashMap::new(),
        };
        let mut ctx = RequestContext::new(envelope, RequestKind::Page, route, CancelFlag::new());

        let mut pipeline = MiddlewarePipeline::new();
        pipeline.push(Arc::new(Compression::new()));
        let resp = pipeline.handle(&mut ctx, &SmallBody).await.unwrap();
        assert!(resp.header("content-encoding").is_none());
    }
}
