//! Origin relay endpoint.
//!
//! `GET {relay_mount}/{*path}` fetches the rendered document for the content
//! path from the origin and relays it with shared-cache and indexing headers.
//! A non-2xx origin status is passed through with a generic body.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, header};
use axum::response::{IntoResponse, Response};

use crawlgate_client::{PathParam, relay_target};

use super::HTML_CONTENT_TYPE;
use crate::error::RelayError;
use crate::handler::AppState;

pub const RELAY_CACHE_CONTROL: &str = "s-maxage=3600, stale-while-revalidate=86400";
pub const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

pub async fn relay_path(
    State(state): State<Arc<AppState>>, Path(path): Path<String>, headers: HeaderMap,
) -> Result<Response, RelayError> {
    relay(&state, &PathParam::Single(path), &headers).await
}

/// The relay mount itself, with no trailing path.
pub async fn relay_root(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response, RelayError> {
    relay(&state, &PathParam::Segments(Vec::new()), &headers).await
}

async fn relay(state: &AppState, param: &PathParam, headers: &HeaderMap) -> Result<Response, RelayError> {
    let target = relay_target(&state.content_prefix, param);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|ua| !ua.trim().is_empty());

    tracing::info!(path = %target, user_agent = user_agent.unwrap_or("-"), "relaying rendered document");

    let doc = state.origin.fetch_rendered(&target, user_agent).await?;

    if !doc.is_success() {
        tracing::warn!(path = %target, status = doc.status.as_u16(), "origin returned error status");
        return Err(RelayError::UpstreamStatus(doc.status));
    }

    tracing::info!(
        path = %target,
        status = doc.status.as_u16(),
        bytes = doc.body.len(),
        fetch_ms = doc.fetch_ms,
        "relayed rendered document"
    );

    Ok((
        [
            (header::CONTENT_TYPE, HTML_CONTENT_TYPE),
            (header::CACHE_CONTROL, RELAY_CACHE_CONTROL),
            (X_ROBOTS_TAG, "index, follow"),
        ],
        doc.body,
    )
        .into_response())
}
