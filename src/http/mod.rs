//! HTTP surface of the runtime.
//!
//! # Data Flow
//! ```text
//! wire request (axum)
//!        │
//!        ▼
//! ingress: headers → envelope, body collected under cap
//!        │
//!        ▼
//! Runtime::handle(envelope)          (transport-neutral core)
//!        │
//!        ▼
//! ingress: RuntimeResponse → wire response
//! ```
//!
//! The envelope and response types are the only vocabulary the core
//! shares with the wire; everything axum-specific stays in `ingress`.

pub mod envelope;
pub mod handlers;
pub mod ingress;
pub mod response;

pub use envelope::RequestEnvelope;
pub use ingress::HttpIngress;
pub use response::{ResponseBody, RuntimeResponse};
