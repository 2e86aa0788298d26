//! Shared fetch-and-relay primitive for the rendering origin.
//!
//! Both the edge classifier and the relay endpoint fetch pre-rendered HTML
//! through [`OriginClient::fetch_rendered`]. Every HTTP status is returned
//! as a [`RenderedDocument`]; only transport and body-read failures are
//! errors, so callers decide for themselves what a non-2xx means.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, StatusCode, Url, header};

use crawlgate_core::{AppConfig, Error};

use crate::url::{canonicalize, join_path};

/// Configuration for the origin client.
#[derive(Debug, Clone)]
pub struct OriginConfig {
    /// Base URL of the rendering origin.
    pub base: Url,
    /// User agent sent when the caller provided none.
    pub default_user_agent: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl OriginConfig {
    /// Build from application settings.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let base = canonicalize(&config.origin_base).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { base, default_user_agent: config.default_user_agent.clone(), timeout: config.timeout() })
    }
}

/// A rendered document as returned by the origin.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// The URL that was requested.
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response body bytes
    pub body: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl RenderedDocument {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// HTTP client for the rendering origin.
#[derive(Debug, Clone)]
pub struct OriginClient {
    http: Client,
    config: OriginConfig,
}

impl OriginClient {
    /// Create a new origin client with the given configuration.
    pub fn new(config: OriginConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.default_user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// The origin URL for an absolute content path.
    pub fn origin_url(&self, path: &str) -> Url {
        join_path(&self.config.base, path)
    }

    /// Fetch the rendered document for `path`, forwarding `user_agent`.
    ///
    /// Falls back to the configured default agent when `user_agent` is None.
    pub async fn fetch_rendered(&self, path: &str, user_agent: Option<&str>) -> Result<RenderedDocument, Error> {
        let start = Instant::now();
        let url = self.origin_url(path);
        let user_agent = user_agent.unwrap_or(&self.config.default_user_agent);

        let response = self
            .http
            .get(url.clone())
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("network error: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {e}")))?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(%url, status = status.as_u16(), bytes = body.len(), fetch_ms, "origin fetch complete");

        Ok(RenderedDocument { url, status, body, fetch_ms })
    }
}
