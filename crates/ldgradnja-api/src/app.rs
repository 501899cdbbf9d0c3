//! Application builder and server runner.

use std::time::Duration;

use axum::Router;
use tokio::sync::watch;
use tracing::{info, warn};

use ldgradnja_core::config::AppConfig;
use ldgradnja_core::error::AppError;
use ldgradnja_core::result::AppResult;

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

/// Runs the LDGradnja server until Ctrl-C or SIGTERM.
///
/// After the signal, in-flight requests get `server.shutdown_grace_seconds`
/// to finish.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    info!(
        strategy = %config.converter.strategy,
        command = %config.converter.command,
        max_upload_mb = config.converter.max_upload_mb(),
        temp_root = %config.converter.effective_temp_root().display(),
        "Starting LDGradnja server"
    );

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = config.server.bind_address();
    let state = AppState::from_config(config)?;
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!(%addr, "LDGradnja server listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining requests");
        let _ = shutdown_tx.send(true);
    });

    tokio::select! {
        result = async { server.await } => {
            result.map_err(|e| AppError::internal(format!("Server error: {e}")))?;
        }
        _ = async {
            let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_seconds = grace.as_secs(), "Grace period elapsed, abandoning open connections");
        }
    }

    info!("LDGradnja server stopped");
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
