//! Transport-neutral request envelope.
//!
//! # Responsibilities
//! - Carry one inbound request through the core, decoupled from the wire
//! - Preserve arrival metadata (id, peer address, timestamp)
//! - Stay immutable; enrichment produces a new value
//!
//! # Design Decisions
//! - Header keys normalized to lowercase at construction
//! - Body attached after header parse via `with_body` (copy-with-addition)
//! - `Instant` for arrival time so deadline math is monotonic

use std::collections::HashMap;
use std::time::Instant;

use bytes::Bytes;

/// One inbound request, as seen by the runtime core.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// Request identifier (generated or propagated by the ingress).
    pub id: String,
    /// Uppercased HTTP-style method token.
    pub method: String,
    /// Raw request target (path plus optional query string).
    pub target: String,
    /// Header map, keys lowercased.
    pub headers: HashMap<String, String>,
    /// Caller address as resolved by the ingress (honors trust-proxy).
    pub remote_addr: String,
    /// Arrival timestamp.
    pub received_at: Instant,
    /// Optional request body.
    pub body: Option<Bytes>,
}

impl RequestEnvelope {
    /// Create an envelope with no body.
    pub fn new(
        id: impl Into<String>,
        method: impl Into<String>,
        target: impl Into<String>,
        headers: HashMap<String, String>,
        remote_addr: impl Into<String>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        Self {
            id: id.into(),
            method: method.into().to_ascii_uppercase(),
            target: target.into(),
            headers,
            remote_addr: remote_addr.into(),
            received_at: Instant::now(),
            body: None,
        }
    }

    /// Return a copy of this envelope with the body attached.
    pub fn with_body(&self, body: Bytes) -> Self {
        let mut copy = self.clone();
        copy.body = Some(body);
        copy
    }

    /// The path portion of the target (query string stripped).
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Look up a header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Size of the attached body in bytes, zero if absent.
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map(Bytes::len).unwrap_or(0)
    }
}
