//! Shared server state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use bytes::Bytes;

use crawlgate_client::{ContentScope, CrawlerClassifier, OriginClient, OriginConfig};
use crawlgate_core::{AppConfig, Error};

use crate::routes::{edge, relay, shell};

/// State shared by every route.
pub struct AppState {
    pub origin: OriginClient,
    pub classifier: CrawlerClassifier,
    /// Content section the edge prerender applies to.
    pub scope: ContentScope,
    pub content_prefix: String,
    /// Route the relay endpoint is mounted on, e.g. `/api/news`.
    pub relay_mount: String,
    /// HTML served to regular browsers.
    pub shell: Bytes,
}

impl AppState {
    pub fn new(config: &AppConfig, shell: Bytes) -> Result<Self, Error> {
        let origin = OriginClient::new(OriginConfig::from_app(config)?)?;
        Ok(Self {
            origin,
            classifier: CrawlerClassifier::default(),
            scope: ContentScope::new(config.content_prefix.as_str()),
            content_prefix: config.content_prefix.clone(),
            relay_mount: config.relay_mount(),
            shell,
        })
    }
}

/// Build the full router: relay, health probe and application shell, all
/// behind the edge prerender middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let relay_with_path = format!("{}/{{*path}}", state.relay_mount);

    Router::new()
        .route("/healthz", get(shell::health))
        .route(&state.relay_mount, get(relay::relay_root))
        .route(&relay_with_path, get(relay::relay_path))
        .fallback(shell::app_shell)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), edge::prerender))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use axum::body::Body;
    use axum::http::Response;
    use http_body_util::BodyExt;

    /// Serve `router` on an ephemeral localhost port and return its base URL.
    pub(crate) async fn spawn_origin(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn state_for(origin_base: &str) -> Arc<AppState> {
        let config = AppConfig { origin_base: origin_base.to_string(), timeout_ms: 5_000, ..AppConfig::default() };
        Arc::new(AppState::new(&config, Bytes::from_static(b"<html>shell</html>")).unwrap())
    }

    pub(crate) async fn body_bytes(response: Response<Body>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }
}
