//! HTTP ingress adapter.
//!
//! # Responsibilities
//! - Turn a wire request into a `RequestEnvelope` (request id, caller
//!   address, bounded body collection)
//! - Hand the envelope to the orchestrator and write its response back
//! - Serve until the drain signal fires, then stop accepting
//!
//! # Design Decisions
//! - The core stays transport-neutral; everything axum-specific lives here
//! - Request id: propagate the configured header when present, else
//!   generate a UUID (both behaviors configurable)
//! - Caller address honors X-Forwarded-For only when trust_proxy is set
//! - Body collection is capped at the configured maximum; overflow is a
//!   413 before the envelope is ever built

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router as AxumRouter,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{RequestIdConfig, RuntimeConfig};
use crate::http::envelope::RequestEnvelope;
use crate::http::response::{ResponseBody, RuntimeResponse};
use crate::runtime::Runtime;

/// State injected into the wire handler.
#[derive(Clone)]
struct IngressState {
    runtime: Arc<Runtime>,
    request_id: RequestIdConfig,
    trust_proxy: bool,
    max_body_bytes: usize,
}

/// Axum front end for the runtime core.
pub struct HttpIngress {
    router: AxumRouter,
}

impl HttpIngress {
    pub fn new(config: &RuntimeConfig, runtime: Arc<Runtime>) -> Self {
        let state = IngressState {
            runtime,
            request_id: config.request_id.clone(),
            trust_proxy: config.server.trust_proxy,
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = AxumRouter::new()
            .route("/", any(ingress_handler))
            .route("/{*path}", any(ingress_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    /// Serve connections until the drain signal fires, then finish
    /// in-flight connections and return.
    pub async fn run(
        self,
        listener: TcpListener,
        mut drain: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP ingress listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = drain.recv().await;
                tracing::info!("Ingress received drain signal, no longer accepting connections");
            })
            .await?;

        tracing::info!("HTTP ingress stopped");
        Ok(())
    }
}

/// Wire handler: envelope in, response out.
async fn ingress_handler(
    State(state): State<IngressState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();

    let mut headers = HashMap::with_capacity(parts.headers.len());
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    let id = request_id(&headers, &state.request_id);
    let remote_addr = caller_address(&headers, peer, state.trust_proxy);
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let envelope = RequestEnvelope::new(id, parts.method.as_str(), target, headers, remote_addr);

    // Collect the body under the configured cap; overflow never reaches
    // the core.
    let envelope = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) if bytes.is_empty() => envelope,
        Ok(bytes) => envelope.with_body(bytes),
        Err(_) => {
            tracing::warn!(request_id = %envelope.id, "Request body exceeded limit during collection");
            return into_wire(RuntimeResponse::payload_too_large());
        }
    };

    into_wire(state.runtime.handle(envelope).await)
}

/// Propagated or generated request identifier.
fn request_id(headers: &HashMap<String, String>, config: &RequestIdConfig) -> String {
    if let Some(id) = headers.get(&config.header_name.to_ascii_lowercase()) {
        if !id.is_empty() {
            return id.clone();
        }
    }
    if config.generate {
        Uuid::new_v4().to_string()
    } else {
        String::new()
    }
}

/// Peer address, or the forwarded client when the proxy is trusted.
fn caller_address(headers: &HashMap<String, String>, peer: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    peer.ip().to_string()
}

/// Convert the core's response into a wire response.
fn into_wire(response: RuntimeResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name, value);
    }

    let body = match response.body {
        ResponseBody::Text(text) => Body::from(text),
        ResponseBody::Binary(bytes) => Body::from(bytes),
    };

    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build wire response");
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from("Internal Server Error"))
            .expect("static fallback response")
    })
}
