//! Runtime lifecycle state machine.
//!
//! # States
//! - Starting: subsystems initializing, no traffic accepted
//! - Ready: serving normally
//! - Degraded: serving, but a dependency is impaired
//! - Draining: refusing new work, letting in-flight requests finish
//! - Stopping: terminal
//!
//! # State Transitions
//! ```text
//! Starting → Ready | Stopping
//! Ready    → Degraded | Draining | Stopping
//! Degraded → Ready | Draining | Stopping
//! Draining → Stopping
//! Stopping → (terminal)
//! ```
//!
//! # Design Decisions
//! - Invalid transitions are rejected (return false), never panic
//! - No self-transitions
//! - Transition history kept in a bounded ring for diagnostics
//! - Check-then-set runs under one mutex; writers are the orchestrator
//!   and the shutdown coordinator only

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

/// Capacity of the transition history ring.
const HISTORY_CAPACITY: usize = 100;

/// Lifecycle state of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Starting,
    Ready,
    Degraded,
    Draining,
    Stopping,
}

impl RuntimeState {
    /// Whether moving to `to` is allowed from this state.
    fn can_transition_to(self, to: RuntimeState) -> bool {
        use RuntimeState::*;
        match (self, to) {
            (Starting, Ready) | (Starting, Stopping) => true,
            (Ready, Degraded) | (Ready, Draining) | (Ready, Stopping) => true,
            (Degraded, Ready) | (Degraded, Draining) | (Degraded, Stopping) => true,
            (Draining, Stopping) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeState::Starting => "starting",
            RuntimeState::Ready => "ready",
            RuntimeState::Degraded => "degraded",
            RuntimeState::Draining => "draining",
            RuntimeState::Stopping => "stopping",
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: RuntimeState,
    pub to: RuntimeState,
    pub at: SystemTime,
}

struct StateInner {
    current: RuntimeState,
    history: VecDeque<StateTransition>,
}

/// Single authoritative owner of the lifecycle state.
pub struct StateManager {
    inner: Mutex<StateInner>,
}

impl StateManager {
    /// Start a new state machine in `Starting`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner {
                current: RuntimeState::Starting,
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
            }),
        }
    }

    /// Attempt a transition. Returns false and leaves the state unchanged
    /// if the move is not in the transition table.
    pub fn transition(&self, to: RuntimeState) -> bool {
        let mut inner = self.inner.lock().expect("state mutex poisoned");

        if !inner.current.can_transition_to(to) {
            tracing::warn!(
                from = inner.current.as_str(),
                to = to.as_str(),
                "Rejected lifecycle transition"
            );
            return false;
        }

        let record = StateTransition {
            from: inner.current,
            to,
            at: SystemTime::now(),
        };
        if inner.history.len() == HISTORY_CAPACITY {
            inner.history.pop_front();
        }
        inner.history.push_back(record);

        tracing::info!(
            from = inner.current.as_str(),
            to = to.as_str(),
            "Lifecycle transition"
        );
        inner.current = to;
        true
    }

    /// The current state.
    pub fn current(&self) -> RuntimeState {
        self.inner.lock().expect("state mutex poisoned").current
    }

    /// True only while Ready or Degraded.
    pub fn can_accept_requests(&self) -> bool {
        matches!(self.current(), RuntimeState::Ready | RuntimeState::Degraded)
    }

    /// True only while Ready.
    pub fn is_ready(&self) -> bool {
        self.current() == RuntimeState::Ready
    }

    /// False only once Stopping.
    pub fn is_alive(&self) -> bool {
        self.current() != RuntimeState::Stopping
    }

    /// Snapshot of the transition history, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.inner
            .lock()
            .expect("state mutex poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
