//! Live request telemetry.
//!
//! # Responsibilities
//! - Count total and in-flight requests
//! - Keep a bounded history of per-request timings
//! - Serve cached aggregate snapshots cheap enough for hot health checks
//! - Sample process resources and scheduler lag
//!
//! # Design Decisions
//! - Snapshot is an immutable value swapped wholesale behind `ArcSwap`;
//!   readers never observe a partially built aggregate
//! - Rebuild at most every 100ms; concurrent readers get the cached value
//! - Percentiles via quickselect on a scratch copy of the timing ring
//! - Active counter decrements are floored at zero

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::observability::metrics;
use crate::telemetry::percentile::percentile;
use crate::telemetry::resources::{CpuTracker, LagSampler};

pub mod percentile;
pub mod resources;

/// Capacity of the timing history ring.
const TIMING_CAPACITY: usize = 1000;

/// How long a cached snapshot stays fresh.
const SNAPSHOT_TTL: Duration = Duration::from_millis(100);

/// One completed request.
#[derive(Debug, Clone, Copy)]
pub struct RequestTiming {
    pub duration_ms: f64,
    pub response_bytes: u64,
}

/// Immutable point-in-time aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub total_requests: u64,
    pub active_requests: u64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub scheduler_lag_ms: f64,
    pub avg_response_bytes: f64,
    /// Unix timestamp of the rebuild, in milliseconds.
    pub generated_at_ms: u64,
}

struct CachedSnapshot {
    built_at: Instant,
    snapshot: TelemetrySnapshot,
}

/// Request telemetry collector.
pub struct Telemetry {
    total: AtomicU64,
    active: AtomicU64,
    timings: Mutex<VecDeque<RequestTiming>>,
    cached: ArcSwap<CachedSnapshot>,
    /// CPU delta state; doubles as the single-rebuilder guard.
    cpu: Mutex<CpuTracker>,
    lag: LagSampler,
}

impl Telemetry {
    /// Create the collector and start the lag sampler. Must be called
    /// inside a tokio runtime.
    pub fn new() -> Self {
        let lag = LagSampler::start();
        let initial = TelemetrySnapshot {
            total_requests: 0,
            active_requests: 0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            memory_mb: resources::sample().memory_mb,
            cpu_percent: 0.0,
            scheduler_lag_ms: 0.0,
            avg_response_bytes: 0.0,
            generated_at_ms: unix_millis(),
        };

        Self {
            total: AtomicU64::new(0),
            active: AtomicU64::new(0),
            timings: Mutex::new(VecDeque::with_capacity(TIMING_CAPACITY)),
            cached: ArcSwap::from_pointee(CachedSnapshot {
                built_at: Instant::now(),
                snapshot: initial,
            }),
            cpu: Mutex::new(CpuTracker::new()),
            lag,
        }
    }

    /// Mark a request as accepted and in flight.
    pub fn request_start(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_active(active);
    }

    /// Mark a request as finished and record its timing sample.
    pub fn request_end(&self, started_at: Instant, response_bytes: u64) {
        let prev = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(1))
            })
            .unwrap_or(0);
        metrics::record_active(prev.saturating_sub(1));

        let timing = RequestTiming {
            duration_ms: started_at.elapsed().as_secs_f64() * 1000.0,
            response_bytes,
        };

        let mut timings = self.timings.lock().expect("timing ring mutex poisoned");
        if timings.len() == TIMING_CAPACITY {
            timings.pop_front();
        }
        timings.push_back(timing);
    }

    /// Requests currently in flight.
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Acquire)
    }

    /// Requests accepted since startup.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Return the cached snapshot, rebuilding if it is older than 100ms.
    pub fn get_snapshot(&self) -> TelemetrySnapshot {
        let cached = self.cached.load();
        if cached.built_at.elapsed() < SNAPSHOT_TTL {
            return cached.snapshot.clone();
        }
        drop(cached);
        self.rebuild(false)
    }

    /// Force a rebuild regardless of cache age.
    pub fn refresh_snapshot(&self) -> TelemetrySnapshot {
        self.rebuild(true)
    }

    fn rebuild(&self, force: bool) -> TelemetrySnapshot {
        let mut cpu = self.cpu.lock().expect("cpu tracker mutex poisoned");

        // Another rebuilder may have finished while we waited for the guard.
        if !force {
            let cached = self.cached.load();
            if cached.built_at.elapsed() < SNAPSHOT_TTL {
                return cached.snapshot.clone();
            }
        }

        let (mut durations, avg_bytes) = {
            let timings = self.timings.lock().expect("timing ring mutex poisoned");
            let durations: Vec<f64> = timings.iter().map(|t| t.duration_ms).collect();
            let avg = if timings.is_empty() {
                0.0
            } else {
                timings.iter().map(|t| t.response_bytes as f64).sum::<f64>() / timings.len() as f64
            };
            (durations, avg)
        };

        let res = resources::sample();
        let snapshot = TelemetrySnapshot {
            total_requests: self.total(),
            active_requests: self.active(),
            p50_ms: percentile(&mut durations, 50.0),
            p95_ms: percentile(&mut durations, 95.0),
            p99_ms: percentile(&mut durations, 99.0),
            memory_mb: res.memory_mb,
            cpu_percent: cpu.cpu_percent(&res),
            scheduler_lag_ms: self.lag.lag_ms(),
            avg_response_bytes: avg_bytes,
            generated_at_ms: unix_millis(),
        };

        self.cached.store(Arc::new(CachedSnapshot {
            built_at: Instant::now(),
            snapshot: snapshot.clone(),
        }));

        snapshot
    }

    /// Cancel background sampling. Safe to call more than once.
    pub fn shutdown(&self) {
        self.lag.shutdown();
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
