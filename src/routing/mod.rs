//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming envelope (method, path)
//!        │
//!        ▼
//! exact lookup (METHOD:path) ──hit──▶ RouteMatch { handler, params: {} }
//!        │ miss
//!        ▼
//! parametric scan (registration order) ──hit──▶ RouteMatch { handler, params }
//!        │ miss
//!        ▼
//! None (caller answers 404)
//! ```

pub mod router;

pub use router::{RouteMatch, Router};
