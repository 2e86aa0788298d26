//! Local proxy that routes every request through the cache agent.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crawlgate_client::agent::network::is_hop_by_hop;
use crawlgate_client::{AgentError, CacheAgent, Interception, Network};
use crawlgate_core::RequestDescriptor;

/// Largest request body forwarded upstream.
const MAX_REQUEST_BODY: usize = 8 * 1024 * 1024;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub fn router<N: Network>(agent: Arc<CacheAgent<N>>) -> Router {
    Router::new().fallback(proxy::<N>).with_state(agent)
}

async fn proxy<N: Network>(State(agent): State<Arc<CacheAgent<N>>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let descriptor = RequestDescriptor::from_parts(&parts.method, path_and_query, &parts.headers);

    match agent.handle(descriptor, body).await {
        Ok(interception) => into_response(interception),
        Err(AgentError::Network { url, source }) => {
            tracing::warn!(%url, error = %source, "network unavailable and nothing cached");
            (StatusCode::GATEWAY_TIMEOUT, "Network unavailable and no cached copy").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "cache agent failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Replay a stored response. Any background revalidation keeps running.
fn into_response(interception: Interception) -> Response {
    let source = interception.source;
    let stored = interception.response;

    let mut response = Response::new(Body::from(stored.body));
    *response.status_mut() = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (name, value) in &stored.headers {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case(header::CONTENT_LENGTH.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            headers.append(name, value);
        }
    }
    headers.insert(X_CACHE, HeaderValue::from_static(source.as_str()));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::Method;
    use bytes::Bytes;
    use crawlgate_client::agent::NetworkResponse;
    use crawlgate_core::{CacheDb, Error};
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;
    use url::Url;

    const SCOPE: &str = "https://site.example";

    /// Echoes the request path, or fails while offline.
    struct EchoNetwork {
        offline: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &RequestDescriptor, body: Bytes) -> Result<NetworkResponse, Error> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::HttpError("offline".into()));
            }
            let url = Url::parse(SCOPE).unwrap().join(&request.path).unwrap();
            let body = if body.is_empty() { Bytes::from(format!("{} {}", request.method, request.path)) } else { body };
            Ok(NetworkResponse {
                url,
                status: 200,
                headers: vec![
                    ("content-type".into(), "text/plain".into()),
                    ("transfer-encoding".into(), "chunked".into()),
                ],
                body,
            })
        }
    }

    async fn app() -> (Router, Arc<AtomicBool>) {
        let offline = Arc::new(AtomicBool::new(false));
        let network = EchoNetwork { offline: Arc::clone(&offline) };
        let db = CacheDb::open_in_memory().await.unwrap();
        let agent = CacheAgent::new(db, "v1", vec!["/".into()], Url::parse(SCOPE).unwrap(), network);
        agent.start().await.unwrap();
        (router(Arc::new(agent)), offline)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: &'static str) -> Response {
        let request = Request::builder().method(method).uri(uri).body(Body::from(body)).unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn text(response: Response) -> String {
        String::from_utf8(response.into_body().collect().await.unwrap().to_bytes().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_manifest_resource_is_a_hit() {
        let (app, _offline) = app().await;
        let response = send(&app, Method::GET, "/", "").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "HIT");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(text(response).await, "GET /");
    }

    #[tokio::test]
    async fn test_first_request_is_a_miss() {
        let (app, _offline) = app().await;
        let response = send(&app, Method::GET, "/news/a", "").await;
        assert_eq!(response.headers()["x-cache"], "MISS");
        assert_eq!(text(response).await, "GET /news/a");
    }

    #[tokio::test]
    async fn test_offline_without_cache_is_gateway_timeout() {
        let (app, offline) = app().await;
        offline.store(true, Ordering::SeqCst);

        let response = send(&app, Method::GET, "/news/unseen", "").await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_offline_with_cache_serves_cached_copy() {
        let (app, offline) = app().await;
        offline.store(true, Ordering::SeqCst);

        let response = send(&app, Method::GET, "/", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "HIT");
    }

    #[tokio::test]
    async fn test_post_body_is_forwarded() {
        let (app, _offline) = app().await;
        let response = send(&app, Method::POST, "/api/form", "a=1").await;
        assert_eq!(response.headers()["x-cache"], "MISS");
        assert_eq!(text(response).await, "a=1");
    }

    #[tokio::test]
    async fn test_passthrough_forwards_request_headers() {
        use axum::routing::post;
        use crawlgate_client::HttpNetwork;

        let echo = |headers: axum::http::HeaderMap| async move {
            let value = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("-").to_string();
            format!("{} {}", value(header::CONTENT_TYPE), value(header::COOKIE))
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let upstream = Router::new().route("/api/form", post(echo));
        tokio::spawn(async move { axum::serve(listener, upstream).await.unwrap() });

        let network = HttpNetwork::new(&base, "crawlgate-test").unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        let agent = CacheAgent::new(db, "v1", vec![], Url::parse(&base).unwrap(), network);
        agent.start().await.unwrap();
        let app = router(Arc::new(agent));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/form")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, "sid=1")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-cache"], "MISS");
        assert_eq!(text(response).await, "application/json sid=1");
    }
}
