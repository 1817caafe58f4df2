//! # Modula Files API
//!
//! Internal HTTP service that extracts single files from gzip tar
//! archives on the mounted document bucket.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mf_common::config::{API_DESCRIPTION, API_TITLE, API_VERSION};
use mf_common::AppConfig;
use mf_server::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (.env first, then FILES_* variables)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .json()
        .init();

    tracing::info!(
        title = API_TITLE,
        version = API_VERSION,
        description = API_DESCRIPTION,
        "Starting server..."
    );

    if !config.root.is_dir() {
        tracing::warn!(root = %config.root.display(), "Archive root is not a directory");
    }
    tracing::info!(
        root = %config.root.display(),
        auth_enabled = config.auth_enabled(),
        "Archive storage configured"
    );

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState { config });
    let app = mf_server::app(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
