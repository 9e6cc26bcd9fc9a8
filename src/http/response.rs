//! Transport-neutral response value.
//!
//! # Responsibilities
//! - Represent the outcome of one request independent of the wire
//! - Provide constructors for every status the core produces
//! - Stay immutable; middleware derives new values instead of mutating

use std::collections::HashMap;

use bytes::Bytes;

/// Response body payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Binary(Bytes),
}

impl ResponseBody {
    pub fn len(&self) -> usize {
        match self {
            ResponseBody::Text(s) => s.len(),
            ResponseBody::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one request.
#[derive(Debug, Clone)]
pub struct RuntimeResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

impl RuntimeResponse {
    /// 200 with a plain-text body.
    pub fn ok_text(body: impl Into<String>) -> Self {
        Self::with_status(200, "text/plain; charset=utf-8", ResponseBody::Text(body.into()))
    }

    /// 200 with a JSON body.
    pub fn ok_json(value: &serde_json::Value) -> Self {
        Self::with_status(200, "application/json", ResponseBody::Text(value.to_string()))
    }

    /// 404: no route or unknown handler.
    pub fn not_found() -> Self {
        Self::with_status(404, "text/plain; charset=utf-8", ResponseBody::Text("Not Found".into()))
    }

    /// 400: malformed or unsafe input rejected at the boundary.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::with_status(400, "text/plain; charset=utf-8", ResponseBody::Text(reason.into()))
    }

    /// 413: request or response exceeded a configured size limit.
    pub fn payload_too_large() -> Self {
        Self::with_status(
            413,
            "text/plain; charset=utf-8",
            ResponseBody::Text("Payload Too Large".into()),
        )
    }

    /// 414: request target longer than the configured maximum.
    pub fn uri_too_long() -> Self {
        Self::with_status(414, "text/plain; charset=utf-8", ResponseBody::Text("URI Too Long".into()))
    }

    /// 431: header count or total header size over the configured limit.
    pub fn header_fields_too_large() -> Self {
        Self::with_status(
            431,
            "text/plain; charset=utf-8",
            ResponseBody::Text("Request Header Fields Too Large".into()),
        )
    }

    /// 429 with a Retry-After hint in whole seconds.
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::with_status(
            429,
            "text/plain; charset=utf-8",
            ResponseBody::Text("Rate limit exceeded".into()),
        )
        .with_header("retry-after", retry_after_secs.to_string())
    }

    /// 500: uncaught execution error. Carries no internal detail.
    pub fn internal_error() -> Self {
        Self::with_status(
            500,
            "text/plain; charset=utf-8",
            ResponseBody::Text("Internal Server Error".into()),
        )
    }

    /// 503: lifecycle state refuses new work.
    pub fn unavailable() -> Self {
        Self::with_status(
            503,
            "text/plain; charset=utf-8",
            ResponseBody::Text("Service Unavailable".into()),
        )
    }

    /// 504: the per-request deadline expired before the handler finished.
    pub fn deadline_exceeded() -> Self {
        Self::with_status(
            504,
            "text/plain; charset=utf-8",
            ResponseBody::Text("Request timed out".into()),
        )
    }

    fn with_status(status: u16, content_type: &str, body: ResponseBody) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self { status, headers, body }
    }

    /// Return a copy with one header set (key lowercased).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Return a copy with the body replaced.
    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Size of the body in bytes.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let resp = RuntimeResponse::rate_limited(3);
        assert_eq!(resp.status, 429);
        assert_eq!(resp.header("Retry-After"), Some("3"));
    }

    #[test]
    fn test_with_header_is_a_copy() {
        let base = RuntimeResponse::ok_text("hello");
        let tagged = base.clone().with_header("X-Runtime", "1");
        assert!(base.header("x-runtime").is_none());
        assert_eq!(tagged.header("x-runtime"), Some("1"));
    }

    #[test]
    fn test_body_len() {
        assert_eq!(RuntimeResponse::ok_text("12345").body_len(), 5);
        let bin = RuntimeResponse::ok_text("").with_body(ResponseBody::Binary(Bytes::from_static(b"abc")));
        assert_eq!(bin.body_len(), 3);
    }
}
