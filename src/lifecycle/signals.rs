//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) or SIGTERM
//! - Translate either into a single "unload everything" event for the host
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signal registration failures are logged and treated as "never fires"

/// Resolve when the process is asked to terminate.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
