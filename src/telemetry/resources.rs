//! Process resource sampling.
//!
//! # Responsibilities
//! - Read resident memory and cumulative CPU time for this process
//! - Derive CPU percentage from deltas between consecutive samples
//! - Measure scheduler lag with a fixed-period timer task
//!
//! # Design Decisions
//! - Linux reads /proc directly; other platforms report zeros
//! - CPU% is Δ(utime+stime) / Δwall, clamped to [0, 100]
//! - Lag is the positive overshoot of the timer period, stored in an
//!   atomic so snapshot rebuilds never block on the sampler

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Point-in-time resource reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceSample {
    /// Resident set size in megabytes.
    pub memory_mb: f64,
    /// Cumulative user+system CPU time.
    pub cpu_time: Duration,
}

/// Read the current process resource usage.
#[cfg(target_os = "linux")]
pub fn sample() -> ResourceSample {
    let memory_mb = std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| {
            let resident_pages: u64 = s.split_whitespace().nth(1)?.parse().ok()?;
            Some(resident_pages as f64 * PAGE_SIZE_BYTES / (1024.0 * 1024.0))
        })
        .unwrap_or(0.0);

    let cpu_time = std::fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|s| {
            // Skip past the parenthesized comm field; it may contain spaces.
            let rest = &s[s.rfind(')')? + 1..];
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let utime: u64 = fields.get(11)?.parse().ok()?;
            let stime: u64 = fields.get(12)?.parse().ok()?;
            Some(Duration::from_secs_f64((utime + stime) as f64 / CLOCK_TICKS_PER_SEC))
        })
        .unwrap_or_default();

    ResourceSample { memory_mb, cpu_time }
}

#[cfg(target_os = "linux")]
const PAGE_SIZE_BYTES: f64 = 4096.0;
#[cfg(target_os = "linux")]
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

#[cfg(not(target_os = "linux"))]
pub fn sample() -> ResourceSample {
    ResourceSample::default()
}

/// CPU percentage derived from deltas between consecutive samples.
#[derive(Debug)]
pub struct CpuTracker {
    last_cpu: Duration,
    last_wall: Instant,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self {
            last_cpu: sample().cpu_time,
            last_wall: Instant::now(),
        }
    }

    /// Percentage of one core used since the previous call, clamped [0, 100].
    pub fn cpu_percent(&mut self, current: &ResourceSample) -> f64 {
        let now = Instant::now();
        let wall = now.duration_since(self.last_wall).as_secs_f64();
        let cpu = current.cpu_time.saturating_sub(self.last_cpu).as_secs_f64();

        self.last_cpu = current.cpu_time;
        self.last_wall = now;

        if wall <= 0.0 {
            return 0.0;
        }
        (cpu / wall * 100.0).clamp(0.0, 100.0)
    }
}

impl Default for CpuTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task measuring scheduler lag.
///
/// A timer fires on a fixed period; any positive overshoot between the
/// expected and actual firing interval is the time the scheduler spent
/// unable to run us.
pub struct LagSampler {
    lag_micros: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Firing period of the lag probe.
const LAG_SAMPLE_PERIOD: Duration = Duration::from_millis(500);

impl LagSampler {
    /// Spawn the sampler task. Must be called inside a tokio runtime.
    pub fn start() -> Self {
        let lag_micros = Arc::new(AtomicU64::new(0));
        let shared = lag_micros.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(LAG_SAMPLE_PERIOD);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // first tick fires immediately
            let mut last = Instant::now();
            loop {
                interval.tick().await;
                let overshoot = last.elapsed().saturating_sub(LAG_SAMPLE_PERIOD);
                shared.store(overshoot.as_micros() as u64, Ordering::Relaxed);
                last = Instant::now();
            }
        });

        Self {
            lag_micros,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Most recent lag reading in milliseconds.
    pub fn lag_ms(&self) -> f64 {
        self.lag_micros.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Cancel the sampler task. Subsequent calls are no-ops.
    pub fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().expect("lag sampler mutex poisoned").take() {
            handle.abort();
            tracing::debug!("Scheduler lag sampler stopped");
        }
    }
}
