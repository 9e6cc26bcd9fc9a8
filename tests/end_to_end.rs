//! End-to-end behavior of the assembled runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use request_runtime::config::RuntimeConfig;
use request_runtime::http::HttpIngress;
use request_runtime::lifecycle::DrainSignal;
use request_runtime::{Runtime, RuntimeState, StateManager, Telemetry};

mod common;

use common::{envelope, envelope_from, ready_runtime, FixedSizeHandler, SleepyHandler};

#[tokio::test]
async fn test_unregistered_path_returns_404() {
    let runtime = ready_runtime(&RuntimeConfig::default());
    let resp = runtime.handle(envelope("GET", "/definitely/not/registered")).await;
    assert_eq!(resp.status, 404);
    runtime.telemetry().shutdown();
}

#[tokio::test]
async fn test_rate_limit_second_request_denied() {
    let mut config = RuntimeConfig::default();
    config.rate_limit.max_requests = 1;
    config.rate_limit.window_ms = 1000;
    let runtime = ready_runtime(&config);

    let first = runtime.handle(envelope_from("198.51.100.1", "GET", "/")).await;
    assert_eq!(first.status, 200);

    let second = runtime.handle(envelope_from("198.51.100.1", "GET", "/")).await;
    assert_eq!(second.status, 429);
    assert_eq!(second.header("retry-after"), Some("1"));

    // A different caller still has its own budget.
    let other = runtime.handle(envelope_from("198.51.100.2", "GET", "/")).await;
    assert_eq!(other.status, 200);

    runtime.telemetry().shutdown();
}

#[tokio::test]
async fn test_draining_state_refuses_new_requests() {
    let runtime = ready_runtime(&RuntimeConfig::default());
    assert!(runtime.state().transition(RuntimeState::Draining));

    let resp = runtime.handle(envelope("GET", "/")).await;
    assert_eq!(resp.status, 503);
    // The rejection was never counted as in flight.
    assert_eq!(runtime.telemetry().total(), 0);

    runtime.telemetry().shutdown();
}

#[tokio::test]
async fn test_slow_handler_hits_deadline() {
    let mut config = RuntimeConfig::default();
    config.timeouts.request_ms = 100;
    config.rate_limit.enabled = false;

    let state = Arc::new(StateManager::new());
    let telemetry = Arc::new(Telemetry::new());
    let mut runtime = Runtime::new(&config, state.clone(), telemetry);
    runtime.register_route("GET", "/slow", "slow");
    runtime.register_handler("slow", Arc::new(SleepyHandler(Duration::from_secs(30))));
    state.transition(RuntimeState::Ready);
    let runtime = Arc::new(runtime);

    let started = Instant::now();
    let resp = runtime.handle(envelope("GET", "/slow")).await;
    assert_eq!(resp.status, 504);
    assert!(started.elapsed() < Duration::from_secs(5));

    runtime.telemetry().shutdown();
}

#[tokio::test]
async fn test_oversized_response_converted_to_413() {
    let mut config = RuntimeConfig::default();
    config.limits.max_response_bytes = 512;
    config.rate_limit.enabled = false;

    let state = Arc::new(StateManager::new());
    let telemetry = Arc::new(Telemetry::new());
    let mut runtime = Runtime::new(&config, state.clone(), telemetry);
    runtime.register_route("GET", "/big", "big");
    runtime.register_handler("big", Arc::new(FixedSizeHandler(2048)));
    state.transition(RuntimeState::Ready);
    let runtime = Arc::new(runtime);

    let resp = runtime.handle(envelope("GET", "/big")).await;
    assert_eq!(resp.status, 413);

    runtime.telemetry().shutdown();
}

#[tokio::test]
async fn test_telemetry_observes_completed_requests() {
    let runtime = ready_runtime(&RuntimeConfig::default());

    for _ in 0..5 {
        runtime.handle(envelope("GET", "/health")).await;
    }

    let snapshot = runtime.telemetry().refresh_snapshot();
    assert_eq!(snapshot.total_requests, 5);
    assert_eq!(snapshot.active_requests, 0);
    assert!(snapshot.avg_response_bytes > 0.0);

    runtime.telemetry().shutdown();
}

#[tokio::test]
async fn test_wire_round_trip() {
    let config = RuntimeConfig::default();
    let runtime = ready_runtime(&config);
    let telemetry = runtime.telemetry().clone();
    let drain = DrainSignal::new();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let ingress = HttpIngress::new(&config, runtime);
    let server = tokio::spawn(ingress.run(listener, drain.subscribe()));

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let ok = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    assert_eq!(ok.text().await.unwrap(), "ready");

    let missing = client.get(format!("{}/nope", base)).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let badge = client.get(format!("{}/badge/build/passing", base)).send().await.unwrap();
    assert_eq!(badge.status().as_u16(), 200);
    assert_eq!(
        badge.headers().get("content-type").unwrap().to_str().unwrap(),
        "image/svg+xml"
    );

    // Close the client pool so no idle connections linger, then drain.
    drop(client);
    drain.trigger();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop after drain")
        .unwrap()
        .unwrap();

    telemetry.shutdown();
}
