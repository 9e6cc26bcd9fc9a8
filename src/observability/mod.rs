//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! orchestrator / rate limiter
//!        │ record_*()
//!        ▼
//! metrics recorder (counters, gauges, histograms)
//!        │
//!        ▼
//! Prometheus exporter (separate listener, optional)
//! ```
//!
//! Structured logging is `tracing` throughout; the subscriber is installed
//! once by the binary, so the library stays silent under test.

pub mod metrics;
