//! Canonical request keys for cache entries.

use http::Method;
use sha2::{Digest, Sha256};
use url::Url;

/// A canonical request: method plus absolute URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: Method,
    url: Url,
}

impl RequestKey {
    /// Build a key, dropping the URL fragment. Host case is already folded by `Url`.
    pub fn new(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Content-addressed hash used as the storage key.
    pub fn hash(&self) -> String {
        compute_cache_key(self.method.as_str(), self.url.as_str())
    }
}

/// Compute a content-addressed cache key for a request.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
