//! Security response headers.
//!
//! Stateless stamping on the way out. Error responses additionally get
//! `cache-control: no-store` so intermediaries never cache a failure.

use async_trait::async_trait;

use crate::http::response::RuntimeResponse;
use crate::middleware::{Middleware, Next, RequestContext};
use crate::runtime::error::RuntimeError;

pub struct SecurityHeaders;

#[async_trait]
impl Middleware for SecurityHeaders {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<RuntimeResponse, RuntimeError> {
        let response = next.run(ctx).await?;

        let mut response = response
            .with_header("x-content-type-options", "nosniff")
            .with_header("x-frame-options", "DENY")
            .with_header("referrer-policy", "no-referrer");

        if response.status >= 400 {
            response = response.with_header("cache-control", "no-store");
        }

        Ok(response)
    }
}
