//! Edge prerender middleware.
//!
//! GET requests under the content prefix are classified by user agent.
//! Crawlers get the origin's rendered HTML directly; everyone else, and any
//! crawler whose prerender fetch fails, continues to the wrapped router
//! untouched.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderName, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crawlgate_client::truncate_user_agent;
use crawlgate_core::RequestDescriptor;

use super::HTML_CONTENT_TYPE;
use crate::handler::AppState;

pub const EDGE_CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate";
pub const X_PRERENDERED: HeaderName = HeaderName::from_static("x-prerendered");

pub async fn prerender(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if request.method() != Method::GET || !state.scope.matches(request.uri().path()) {
        return next.run(request).await;
    }

    let path_and_query = request.uri().path_and_query().map_or("/", |pq| pq.as_str());
    let descriptor = RequestDescriptor::from_parts(request.method(), path_and_query, request.headers());
    let user_agent = descriptor.user_agent.as_deref();
    let is_bot = state.classifier.is_automated_agent(user_agent);

    tracing::info!(
        path = descriptor.path_only(),
        user_agent = truncate_user_agent(user_agent.unwrap_or("-")),
        is_bot,
        "edge request"
    );

    if !is_bot {
        return next.run(request).await;
    }

    match state.origin.fetch_rendered(descriptor.path_only(), user_agent).await {
        Ok(doc) if doc.is_success() => {
            tracing::info!(path = descriptor.path_only(), bytes = doc.body.len(), fetch_ms = doc.fetch_ms, "served prerendered document");
            (
                [
                    (header::CONTENT_TYPE, HTML_CONTENT_TYPE),
                    (header::CACHE_CONTROL, EDGE_CACHE_CONTROL),
                    (X_PRERENDERED, "1"),
                ],
                doc.body,
            )
                .into_response()
        }
        Ok(doc) => {
            tracing::warn!(path = descriptor.path_only(), status = doc.status.as_u16(), "prerender fetch failed, falling through");
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(path = descriptor.path_only(), error = %e, "prerender fetch failed, falling through");
            next.run(request).await
        }
    }
}
