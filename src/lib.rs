//! Embeddable request-serving runtime.
//!
//! Accepts a transport-neutral request envelope, gates it against a
//! lifecycle state machine, routes it, runs it through a composable
//! middleware chain, enforces a per-request deadline, and returns a
//! transport-neutral response, with live telemetry and a bounded-time
//! graceful drain on shutdown.
//!
//! # Architecture Overview
//!
//! ```text
//!   ingress adapter (http)          core (transport-neutral)
//!  ┌────────────────────┐   ┌───────────────────────────────────────┐
//!  │ wire ⇄ envelope    │──▶│ Runtime.handle(envelope)              │
//!  └────────────────────┘   │   │                                   │
//!                           │   ├─ lifecycle gate (StateManager)    │
//!                           │   ├─ telemetry start                  │
//!                           │   ├─ race ┬ validate → route →        │
//!                           │   │       │ middleware → handler      │
//!                           │   │       └ deadline timer            │
//!                           │   └─ telemetry end                    │
//!                           └───────────────────────────────────────┘
//!   shutdown: signal → Draining → drain poll → Stopping
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod runtime;

// Traffic management
pub mod middleware;
pub mod telemetry;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::RuntimeConfig;
pub use http::{HttpIngress, RequestEnvelope, RuntimeResponse};
pub use lifecycle::{DrainSignal, RuntimeState, StateManager};
pub use runtime::Runtime;
pub use telemetry::Telemetry;
