use anyhow::Context;
use axum::ServiceExt;
use axum::extract::Request;
use tracing::{info, warn};

use hbnb_api::server::ServerConfig;
use hbnb_infra::StorageConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hbnb_observability::init();

    let storage_config = StorageConfig::from_env().context("invalid storage configuration")?;
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;

    let storage = hbnb_infra::storage::open(&storage_config)
        .await
        .context("failed to open storage")?;
    storage.reload().await.context("failed to load storage")?;

    let app = hbnb_api::app::build_app(storage.clone());

    let listener = tokio::net::TcpListener::bind(server_config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", server_config.bind_address()))?;

    info!(
        addr = %listener.local_addr()?,
        backend = storage.backend_name(),
        entities = storage.count(None),
        "listening"
    );

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    storage.close().await.context("failed to flush storage on shutdown")?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
