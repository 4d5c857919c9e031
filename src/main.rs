use std::process::ExitCode;
use std::sync::Arc;

use ingest_gateway::{bootstrap, config::AppConfig, routes};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Initializing ingest-gateway");

    let prometheus_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Arc::new(handle),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus metrics recorder");
            return ExitCode::FAILURE;
        }
    };
    bootstrap::describe_metrics();

    // Nothing is served unless the upload directory and the queue are ready.
    let state = match bootstrap::init(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let app = routes::router(state, config.max_upload_bytes, Some(prometheus_handle));

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, bind_addr = %config.bind_addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Server listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    // The router, and with it the queue connection, is dropped by now.
    tracing::info!("Server stopped, queue connection closed");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
