// src/web.rs
//! HTTP server startup.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::repository::RepositoryManager;
use crate::services::ServiceManager;

pub async fn start_server<R: RepositoryManager>(services: Arc<ServiceManager<R>>) -> Result<()> {
    let address = format!(
        "{}:{}",
        services.config().server.host,
        services.config().server.port
    );

    let app = create_router(AppState::new(services));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("API available at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
