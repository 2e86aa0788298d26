//! crawlgate-agent entry point.
//!
//! Installs and activates the current cache generation, then proxies every
//! local request through the offline cache agent.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crawlgate_client::{CacheAgent, HttpNetwork};
use crawlgate_core::{AppConfig, CacheDb};

mod proxy;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let agent_config = &config.agent;

    let db = CacheDb::open(&agent_config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", agent_config.db_path.display()))?;
    let network = HttpNetwork::new(&agent_config.upstream, &config.default_user_agent)?;
    let agent = CacheAgent::from_config(db, agent_config, network)?;

    let purged = agent.start().await.context("cache agent failed to start")?;
    tracing::info!(
        listen_addr = %agent_config.listen_addr,
        upstream = %agent.scope(),
        generation = agent.generation(),
        purged = purged.len(),
        "starting crawlgate-agent"
    );

    let app = proxy::router(Arc::new(agent));
    let listener = tokio::net::TcpListener::bind(&agent_config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", agent_config.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("crawlgate-agent shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
