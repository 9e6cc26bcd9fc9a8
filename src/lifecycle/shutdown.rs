//! Shutdown coordination.
//!
//! # Responsibilities
//! - Broadcast the drain signal to every long-running task (ingress
//!   accept loop, rate-limiter sweeper)
//! - Drive the multi-phase drain protocol with a bounded time budget
//!
//! # Phases
//! ```text
//! 1. state → Draining        (rejected = already shutting down, no-op)
//! 2. trigger drain signal    (ingress stops accepting)
//! 3. poll active count       (until 0 or the drain budget is spent)
//! 4. telemetry.shutdown()    (cancel background samplers)
//! 5. state → Stopping
//! ```

use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::lifecycle::state::{RuntimeState, StateManager};
use crate::telemetry::Telemetry;

/// Broadcast channel that long-running tasks subscribe to.
pub struct DrainSignal {
    tx: broadcast::Sender<()>,
}

impl DrainSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the drain signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Subscribers that already exited are fine.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for DrainSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished inside the budget.
    Drained,
    /// The budget ran out with requests still active.
    Forced,
    /// Shutdown was already underway; this call did nothing.
    AlreadyStopping,
}

/// Result handed back to the caller, which decides process-exit semantics.
#[derive(Debug, Clone, Copy)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Requests still active at the end of the drain.
    pub remaining_active: u64,
    pub elapsed: Duration,
}

/// Drain knobs.
#[derive(Debug, Clone, Copy)]
pub struct DrainOptions {
    /// Total drain budget.
    pub timeout: Duration,
    /// Interval between active-count polls.
    pub poll_interval: Duration,
}

impl DrainOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Run the graceful shutdown protocol.
///
/// Safe to invoke from multiple signal handlers concurrently: only the
/// caller that wins the Draining transition runs the drain, everyone else
/// gets an `AlreadyStopping` report.
pub async fn graceful_shutdown(
    state: &StateManager,
    telemetry: &Telemetry,
    drain: &DrainSignal,
    options: DrainOptions,
) -> DrainReport {
    let started = Instant::now();

    if !state.transition(RuntimeState::Draining) {
        tracing::info!(state = state.current().as_str(), "Shutdown already in progress");
        return DrainReport {
            outcome: DrainOutcome::AlreadyStopping,
            remaining_active: telemetry.active(),
            elapsed: started.elapsed(),
        };
    }

    tracing::info!(
        budget_ms = options.timeout.as_millis() as u64,
        "Draining: new requests refused, waiting for in-flight work"
    );
    drain.trigger();

    let drained = tokio::time::timeout(options.timeout, async {
        let mut ticker = tokio::time::interval(options.poll_interval);
        loop {
            ticker.tick().await;
            let active = telemetry.active();
            if active == 0 {
                return;
            }
            tracing::info!(active, "Draining in-flight requests");
        }
    })
    .await
    .is_ok();

    telemetry.shutdown();
    state.transition(RuntimeState::Stopping);

    let remaining_active = telemetry.active();
    let outcome = if drained {
        DrainOutcome::Drained
    } else {
        DrainOutcome::Forced
    };

    match outcome {
        DrainOutcome::Drained => {
            tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "Drain complete")
        }
        _ => tracing::warn!(
            remaining_active,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Drain budget exhausted; forcing shutdown"
        ),
    }

    DrainReport {
        outcome,
        remaining_active,
        elapsed: started.elapsed(),
    }
}
