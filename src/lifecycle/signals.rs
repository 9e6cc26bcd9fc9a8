//! OS signal handling.
//!
//! Translates termination signals into the graceful-shutdown path. The
//! binary installs this once; the library never touches process signals.

/// Wait until the process receives SIGINT (Ctrl+C) or, on unix, SIGTERM.
pub async fn wait_for_termination() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received"),
            _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        tracing::info!("Ctrl+C received");
    }
}
