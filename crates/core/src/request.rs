//! Request descriptor shared by the classifier, relay and cache agent.

use http::{HeaderMap, Method, header};

/// Headers that describe a single connection and must not be stored or replayed.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// The fields of an inbound request that crawlgate actually consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Absolute path, including the query string if one was sent.
    pub path: String,
    pub user_agent: Option<String>,
    /// End-to-end headers to replay upstream. Excludes `Host`, `Content-Length`,
    /// `User-Agent` and hop-by-hop headers.
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    /// Describe a GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), user_agent: None, headers: HeaderMap::new() }
    }

    /// Build a descriptor from the parts of an HTTP request.
    ///
    /// A user agent that is not valid visible ASCII is treated as absent.
    pub fn from_parts(method: &Method, path_and_query: &str, headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        let mut forwarded = HeaderMap::new();
        for (name, value) in headers {
            if *name == header::HOST
                || *name == header::CONTENT_LENGTH
                || *name == header::USER_AGENT
                || is_hop_by_hop(name.as_str())
            {
                continue;
            }
            forwarded.append(name.clone(), value.clone());
        }

        Self { method: method.clone(), path: path_and_query.to_string(), user_agent, headers: forwarded }
    }

    /// Path without the query string.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(p, _)| p)
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_from_parts_reads_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Googlebot/2.1"));
        let desc = RequestDescriptor::from_parts(&Method::GET, "/news/a?x=1", &headers);
        assert_eq!(desc.user_agent.as_deref(), Some("Googlebot/2.1"));
        assert_eq!(desc.path, "/news/a?x=1");
        assert_eq!(desc.path_only(), "/news/a");
    }

    #[test]
    fn test_blank_user_agent_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("   "));
        let desc = RequestDescriptor::from_parts(&Method::GET, "/", &headers);
        assert!(desc.user_agent.is_none());
    }

    #[test]
    fn test_from_parts_keeps_end_to_end_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::COOKIE, HeaderValue::from_static("sid=1"));
        headers.append(header::ACCEPT, HeaderValue::from_static("text/html"));
        headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(header::HOST, HeaderValue::from_static("127.0.0.1:8787"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("7"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.4.0"));

        let desc = RequestDescriptor::from_parts(&Method::POST, "/api/form", &headers);
        assert_eq!(desc.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(desc.headers[header::COOKIE], "sid=1");
        assert_eq!(desc.headers.get_all(header::ACCEPT).iter().count(), 2);
        for dropped in [header::HOST, header::CONTENT_LENGTH, header::CONNECTION, header::TRANSFER_ENCODING, header::USER_AGENT] {
            assert!(!desc.headers.contains_key(&dropped), "{dropped} should not be forwarded");
        }
        assert_eq!(desc.user_agent.as_deref(), Some("curl/8.4.0"));
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("connection"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[test]
    fn test_is_get() {
        assert!(RequestDescriptor::get("/").is_get());
        let post = RequestDescriptor { method: Method::POST, ..RequestDescriptor::get("/") };
        assert!(!post.is_get());
    }
}
