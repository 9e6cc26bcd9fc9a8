//! Request runtime server binary.
//!
//! Wires the subsystems together in dependency order: configuration →
//! telemetry → orchestrator → ingress, then supervises shutdown. Fatal
//! errors here (bad config, bind failure) are the only ones allowed to
//! terminate the process.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_runtime::config::{load_config, RuntimeConfig};
use request_runtime::http::HttpIngress;
use request_runtime::lifecycle::{
    graceful_shutdown, signals, DrainOptions, DrainOutcome, DrainSignal,
};
use request_runtime::{Runtime, RuntimeState, StateManager, Telemetry};

/// Drain budget used when shutdown is triggered by a panic rather than a
/// signal.
const PANIC_DRAIN_BUDGET: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration first: fail fast before anything binds.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => RuntimeConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "request_runtime={},tower_http=warn",
                    config.observability.log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address(),
        request_timeout_ms = config.timeouts.request_ms,
        rate_limit_enabled = config.rate_limit.enabled,
        "request-runtime starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => request_runtime::observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = Arc::new(StateManager::new());
    let telemetry = Arc::new(Telemetry::new());
    let drain = Arc::new(DrainSignal::new());

    let (runtime, limiter) = Runtime::standard(&config, state.clone(), telemetry.clone());
    let runtime = Arc::new(runtime);

    if let Some(limiter) = &limiter {
        limiter.spawn_sweeper(drain.subscribe());
    }

    // Route panics anywhere in the process into the shutdown path.
    let (panic_tx, mut panic_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);
        let _ = panic_tx.send(());
    }));

    let listener = TcpListener::bind(config.server.bind_address()).await?;

    let ingress = HttpIngress::new(&config, runtime);
    let mut server = tokio::spawn(ingress.run(listener, drain.subscribe()));

    if !state.transition(RuntimeState::Ready) {
        return Err("runtime failed to reach Ready".into());
    }

    // Wait for whatever ends the serving phase.
    let drain_options = tokio::select! {
        _ = signals::wait_for_termination() => {
            DrainOptions::with_timeout(Duration::from_millis(config.timeouts.shutdown_drain_ms))
        }
        _ = panic_rx.recv() => {
            tracing::error!("Panic reported; shutting down with shortened drain budget");
            DrainOptions::with_timeout(
                PANIC_DRAIN_BUDGET.min(Duration::from_millis(config.timeouts.shutdown_drain_ms)),
            )
        }
        result = &mut server => {
            tracing::error!(result = ?result, "Ingress exited unexpectedly");
            DrainOptions::with_timeout(PANIC_DRAIN_BUDGET)
        }
    };

    let report = graceful_shutdown(&state, &telemetry, &drain, drain_options).await;

    // The drain signal stops the accept loop; wait for it to wind down.
    if !server.is_finished() {
        let _ = server.await;
    }

    match report.outcome {
        DrainOutcome::Forced => {
            tracing::warn!(
                remaining_active = report.remaining_active,
                "Shutdown complete (forced)"
            );
            std::process::exit(1);
        }
        _ => {
            tracing::info!(elapsed_ms = report.elapsed.as_millis() as u64, "Shutdown complete");
            Ok(())
        }
    }
}
