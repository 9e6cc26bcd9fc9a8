//! Admission-control middleware: per-key token bucket.
//!
//! # Responsibilities
//! - Allow at most `max_requests` per `window_ms` per key (default key:
//!   caller address), with burst up to the full budget
//! - Bound tracked-key cardinality; deny new keys past `max_keys`
//! - Evict idle buckets on a periodic background sweep
//!
//! # Design Decisions
//! - Continuous refill computed from elapsed time, not discrete ticks
//! - Bucket creation consumes the first token
//! - Fail closed under key exhaustion to bound memory
//! - DashMap shards keep the sweep from blocking request handling

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::http::response::RuntimeResponse;
use crate::middleware::{Middleware, Next, RequestContext};
use crate::observability::metrics;
use crate::runtime::error::RuntimeError;

/// Per-key refill state.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A fresh bucket with one token already consumed.
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity - 1.0,
            last_refill: Instant::now(),
        }
    }

    /// Refill from elapsed time, then try to consume one token.
    fn try_acquire(&mut self, capacity: f64, window: Duration) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let refill = elapsed / window.as_secs_f64() * capacity;

        self.tokens = (self.tokens + refill).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Key extraction for bucket lookup.
type KeyFn = dyn Fn(&RequestContext) -> String + Send + Sync;

/// Token-bucket rate limiter, mounted as pipeline middleware.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    window: Duration,
    max_keys: usize,
    cleanup_interval: Duration,
    key_fn: Box<KeyFn>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity: config.max_requests as f64,
            window: Duration::from_millis(config.window_ms),
            max_keys: config.max_keys,
            cleanup_interval: Duration::from_millis(config.cleanup_interval_ms),
            key_fn: Box::new(|ctx| ctx.envelope.remote_addr.clone()),
        }
    }

    /// Override the default caller-address key.
    pub fn with_key_fn(mut self, key_fn: impl Fn(&RequestContext) -> String + Send + Sync + 'static) -> Self {
        self.key_fn = Box::new(key_fn);
        self
    }

    /// Admit or deny one request for `key`.
    fn check(&self, key: &str) -> bool {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_acquire(self.capacity, self.window);
        }

        if self.buckets.len() >= self.max_keys {
            tracing::warn!(tracked_keys = self.buckets.len(), "Rate limiter key budget exhausted");
            return false;
        }

        match self.buckets.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                entry.get_mut().try_acquire(self.capacity, self.window)
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(TokenBucket::new(self.capacity));
                true
            }
        }
    }

    /// Retry-After hint: the window rounded up to whole seconds.
    fn retry_after_secs(&self) -> u64 {
        (self.window.as_millis() as u64).div_ceil(1000)
    }

    /// Drop buckets idle longer than twice the window.
    fn sweep_idle(&self) {
        let idle_cutoff = self.window * 2;
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.last_refill.elapsed() <= idle_cutoff);
        let evicted = before - self.buckets.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle rate-limit buckets");
        }
    }

    /// Spawn the periodic eviction sweep. Purely housekeeping: it exits on
    /// the shutdown signal and never touches the request path.
    pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.cleanup_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => limiter.sweep_idle(),
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate limiter sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    async fn handle(
        &self,
        ctx: &mut RequestContext,
        next: Next<'_>,
    ) -> Result<RuntimeResponse, RuntimeError> {
        let key = (self.key_fn)(ctx);
        if self.check(&key) {
            next.run(ctx).await
        } else {
            tracing::warn!(request_id = %ctx.id(), client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
            Ok(RuntimeResponse::rate_limited(self.retry_after_secs()))
        }
    }
}
