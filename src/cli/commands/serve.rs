use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use crate::config::{Settings, initialize_app_state};
use crate::router::create_router;
use crate::schemas::AppState;
use crate::services::{cleanup::spawn_session_sweeper, users};

pub async fn serve(settings: Settings) -> Result<()> {
    trace!("Entering serve function");
    info!("Polit application starting up");
    debug!("Database URL: {}", settings.database.url);
    debug!("Bind address: {}", settings.server.bind_address);

    let state = initialize_app_state(settings).await?;
    debug!("Application state initialized successfully");
    run_server(state).await
}

/// Prepares reference data, starts background tasks and serves HTTP until
/// Ctrl-C. Background tasks are stopped once the server has drained.
pub async fn run_server(state: AppState) -> Result<()> {
    users::ensure_roles(&state.db)
        .await
        .context("Failed to ensure default roles")?;
    if let Err(e) = users::bootstrap_admin(&state).await {
        error!("Initial admin bootstrap failed: {}", e);
    }

    let sweep_every = Duration::from_secs(state.settings.session.cleanup_interval_minutes * 60);
    let sweeper = spawn_session_sweeper(state.sessions.clone(), sweep_every);
    let dashboard = state.dashboard.clone();
    let bind_address = state.settings.server.bind_address.clone();

    trace!("Creating application router");
    let app = create_router(state);
    debug!("Router created successfully");

    info!("Starting server on {}", bind_address);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to address {bind_address}"))?;

    info!("Polit API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    dashboard.shutdown();

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    info!("Server shutdown gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for Ctrl-C, shutting down: {}", e),
    }
}
