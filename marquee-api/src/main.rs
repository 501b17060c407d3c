//! MARQUEE API Server Entry Point
//!
//! Bootstraps telemetry and configuration, builds the cache gateway once
//! and starts the Axum HTTP server.

use marquee_api::telemetry::{init_tracer, TelemetryConfig};
use marquee_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let config = ApiConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    let app = create_api_router(state);

    let addr = config.bind_addr()?;
    tracing::info!(
        %addr,
        upstream = %config.upstream_url,
        max_entries = config.cache.max_entries,
        admin_token = config.admin_token.is_some(),
        "Starting MARQUEE API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
