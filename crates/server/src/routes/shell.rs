//! Application shell fallthrough and health probe.
//!
//! Anything the relay and edge layers do not answer is handed to the
//! client-rendered application.

use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use bytes::Bytes;
use serde_json::json;

use super::HTML_CONTENT_TYPE;
use crate::handler::AppState;

/// Served when no application shell file is configured.
pub const DEFAULT_SHELL: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="manifest" href="/manifest.json">
<title>crawlgate</title>
</head>
<body>
<div id="root"></div>
</body>
</html>
"#;

/// Read the application shell from `path`, or use the built-in one.
pub async fn load_shell(path: Option<&Path>) -> std::io::Result<Bytes> {
    match path {
        Some(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        None => Ok(Bytes::from_static(DEFAULT_SHELL.as_bytes())),
    }
}

pub async fn app_shell(State(state): State<Arc<AppState>>, method: Method) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }
    ([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], state.shell.clone()).into_response()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
