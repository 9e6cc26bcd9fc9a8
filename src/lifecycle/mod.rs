//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!   Starting ──(subsystems wired, listener bound)──▶ Ready
//!
//! Shutdown (signals.rs → shutdown.rs):
//!   SIGTERM/SIGINT
//!        │
//!        ▼
//!   graceful_shutdown: Ready/Degraded → Draining → Stopping
//!        │
//!        ├── drain signal → ingress stops accepting, sweeper exits
//!        └── poll active count until 0 or budget spent
//! ```

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{graceful_shutdown, DrainOptions, DrainOutcome, DrainReport, DrainSignal};
pub use state::{RuntimeState, StateManager, StateTransition};
