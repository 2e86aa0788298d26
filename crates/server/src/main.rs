//! crawlgate server entry point.
//!
//! Serves the origin relay endpoint and the application shell, with the
//! edge prerender middleware in front of every route.
//! Logs are JSON on stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crawlgate_core::AppConfig;

mod error;
mod handler;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let shell = routes::shell::load_shell(config.app_shell_path.as_deref())
        .await
        .context("failed to read application shell")?;

    let state = Arc::new(handler::AppState::new(&config, shell).context("failed to build origin client")?);

    tracing::info!(
        listen_addr = %config.listen_addr,
        origin = %config.origin_base,
        content_prefix = %config.content_prefix,
        relay_mount = %state.relay_mount,
        "starting crawlgate"
    );

    let app = handler::router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("crawlgate shut down");
    Ok(())
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
