//! Outbound fetch abstraction used by the cache agent.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url, header};

use crawlgate_core::{Error, RequestDescriptor, StoredResponse};

use crate::url::{canonicalize, join_path};

pub use crawlgate_core::request::is_hop_by_hop;

/// A response as it came off the network.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl NetworkResponse {
    pub fn to_stored(&self) -> StoredResponse {
        StoredResponse {
            url: self.url.to_string(),
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// The network the agent sits in front of.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Perform `request` against the real network.
    async fn fetch(&self, request: &RequestDescriptor, body: Bytes) -> Result<NetworkResponse, Error>;
}

/// [`Network`] backed by reqwest against one upstream site.
///
/// No request timeout is configured: fetches run until they complete or
/// the connection fails.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    http: Client,
    upstream: Url,
}

impl HttpNetwork {
    pub fn new(upstream: &str, default_user_agent: &str) -> Result<Self, Error> {
        let upstream = canonicalize(upstream).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let http = Client::builder()
            .user_agent(default_user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, upstream })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &RequestDescriptor, body: Bytes) -> Result<NetworkResponse, Error> {
        let url = join_path(&self.upstream, &request.path);

        let mut builder = self.http.request(request.method.clone(), url.clone()).headers(request.headers.clone());
        if let Some(user_agent) = &request.user_agent {
            builder = builder.header(header::USER_AGENT, user_agent);
        }
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("network error for {url}: {e}")))?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {e}")))?;

        Ok(NetworkResponse { url: final_url, status, headers, body })
    }
}
