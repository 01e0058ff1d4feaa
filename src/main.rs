use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use empathy_backend::core::config::{AppPaths, ConfigService};
use empathy_backend::core::logging;
use empathy_backend::server;
use empathy_backend::state::error::InitializationError;
use empathy_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config = ConfigService::new(paths.clone());
    let settings = config
        .load_settings()
        .map_err(|e| InitializationError::Config(e.into()))?;

    logging::init(&paths, &settings.logging)?;

    match config.load_config() {
        Ok(raw) => tracing::info!(
            "Effective configuration: {}",
            config.redact_sensitive_values(&raw)
        ),
        Err(err) => tracing::warn!("Failed to reload configuration for logging: {}", err),
    }

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::initialize(&paths, &settings).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
