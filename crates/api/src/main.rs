use anyhow::Context;
use indexsync_infra::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    indexsync_observability::init();

    let config = ServiceConfig::from_env().context("reading configuration")?;
    let registry = indexsync_api::app::services::build_services(&config).await?;
    registry.start().await.context("starting scheduler")?;

    let app = indexsync_api::app::build_app(registry.clone());
    let listener = tokio::net::TcpListener::bind(config.admin_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.admin_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("admin server")?;

    registry.shutdown().await.context("stopping scheduler")?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
