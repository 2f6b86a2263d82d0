//! Hookcron Server - Main entry point
//!
//! Scheduled webhook dispatcher.

use std::sync::Arc;

use anyhow::Context;

use hookcron_core::{
    api::{self, AppState},
    config::Config,
    jobs::JobManager,
    telemetry::{self, TelemetryConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration; a malformed file or variable stops startup
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize telemetry
    let metrics = telemetry::init_telemetry(&TelemetryConfig::from_app_config(&config))?;

    tracing::info!(
        version = hookcron_core::VERSION,
        cluster = config.cluster.enabled,
        "Starting Hookcron Server"
    );

    // Wire the job manager; cluster mode fails here if the broker is unreachable
    let manager = Arc::new(JobManager::start(&config).await?);

    // Build router
    let app = api::build_router(AppState::new(manager.clone(), metrics));

    // Start server
    let addr = config.server.bind_address();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    manager.shutdown().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
