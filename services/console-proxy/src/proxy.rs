//! HTTP forwarding logic
//!
//! Receives inbound console traffic, matches it against the route table by
//! longest path prefix, strips hop-by-hop headers, and forwards to the
//! route's upstream. The upstream's status and body come back verbatim —
//! including error statuses, which the client core classifies on its side of
//! the wire. The proxy itself never interprets response payloads.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use common::Secret;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tracing::{error, instrument, warn};

use crate::config::RouteConfig;

/// Headers to strip before forwarding (hop-by-hop per RFC 2616 Section 13.5.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Maximum buffered request body size
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// One resolved forwarding rule.
pub struct Route {
    pub prefix: String,
    pub upstream_url: String,
    pub timeout: Duration,
    pub strip_prefix: bool,
    pub authorization: Option<Secret<String>>,
}

impl Route {
    pub fn from_config(config: RouteConfig) -> Self {
        Self {
            prefix: config.prefix,
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            strip_prefix: config.strip_prefix,
            authorization: config.authorization,
        }
    }

    /// Whether this route owns the given request path. A prefix match must
    /// end at a path segment boundary: `/es` owns `/es/_search` but not
    /// `/essentials`.
    fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Shared state passed to the proxy handler via axum State extractor
#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub routes: Arc<Vec<Route>>,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
}

/// Pick the owning route for a path, longest prefix first.
pub fn match_route<'a>(routes: &'a [Route], path: &str) -> Option<&'a Route> {
    routes
        .iter()
        .filter(|r| r.matches(path))
        .max_by_key(|r| r.prefix.len())
}

/// JSON error envelope: {"error":{"type":"proxy_error","message":"...","request_id":"req_..."}}
fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": "proxy_error",
            "message": message,
            "request_id": request_id,
        }
    });
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Forward an inbound request to its upstream.
///
/// Upstream timeouts get 2 retries with 100ms fixed backoff — all three
/// console upstreams serve read-mostly query traffic, so replaying a
/// timed-out request is safe.
#[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.uri().path()))]
pub async fn proxy_request(
    state: &ProxyState,
    request: axum::http::Request<axum::body::Body>,
    request_id: String,
) -> Response {
    state
        .requests_total
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();

    let Some(route) = match_route(&state.routes, &path) else {
        state
            .errors_total
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        crate::metrics::record_unrouted();
        return error_response(
            StatusCode::NOT_FOUND,
            &format!("no route for {path}"),
            &request_id,
        );
    };

    let upstream_url = build_upstream_url(route, &uri);

    // Collect request headers, stripping hop-by-hop
    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in request.headers() {
        if !is_hop_by_hop(name.as_str()) {
            headers.insert(name.clone(), value.clone());
        }
    }

    // Attach the route's upstream credential, but never clobber one the
    // client sent itself — the API backend route carries the console's own
    // bearer header end to end.
    if let Some(ref authorization) = route.authorization {
        if !headers.contains_key(reqwest::header::AUTHORIZATION) {
            match HeaderValue::from_str(authorization.expose()) {
                Ok(value) => {
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
                Err(e) => {
                    warn!(prefix = %route.prefix, error = %e, "skipping invalid upstream authorization value");
                }
            }
        }
    }

    // Read the request body
    let body_bytes: bytes::Bytes = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            state
                .errors_total
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            error!(error = %e, "failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {e}"),
                &request_id,
            );
        }
    };

    // Retry loop: up to 2 retries (3 total attempts) for timeouts only
    let max_attempts = 3u32;
    let retry_delay = Duration::from_millis(100);

    for attempt in 0..max_attempts {
        if attempt > 0 {
            warn!(attempt, "retrying after upstream timeout");
            tokio::time::sleep(retry_delay).await;
        }

        let req = state
            .client
            .request(method.clone(), &upstream_url)
            .headers(headers.clone())
            .timeout(route.timeout)
            .body(body_bytes.clone());

        match req.send().await {
            Ok(upstream_response) => {
                let status = upstream_response.status();
                let resp_headers = upstream_response.headers().clone();

                match upstream_response.bytes().await {
                    Ok(resp_body) => {
                        let mut response = Response::builder().status(status);
                        for (name, value) in &resp_headers {
                            if !is_hop_by_hop(name.as_str()) {
                                response = response.header(name, value);
                            }
                        }
                        return response
                            .body(axum::body::Body::from(resp_body))
                            .unwrap_or_else(|e| {
                                error_response(
                                    StatusCode::INTERNAL_SERVER_ERROR,
                                    &format!("response build error: {e}"),
                                    &request_id,
                                )
                            });
                    }
                    Err(e) => {
                        state
                            .errors_total
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        crate::metrics::record_upstream_error("body_read", &route.prefix);
                        error!(error = %e, "failed to read upstream response body");
                        return error_response(
                            StatusCode::BAD_GATEWAY,
                            &format!("upstream response read error: {e}"),
                            &request_id,
                        );
                    }
                }
            }
            Err(e) if e.is_timeout() && attempt < max_attempts - 1 => {
                // Timeout and we have retries left — continue loop
                continue;
            }
            Err(e) if e.is_timeout() => {
                state
                    .errors_total
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                crate::metrics::record_upstream_error("timeout", &route.prefix);
                error!(error = %e, attempts = max_attempts, "upstream timeout after all retries");
                return error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    &format!(
                        "upstream timeout after {}s ({max_attempts} attempts)",
                        route.timeout.as_secs()
                    ),
                    &request_id,
                );
            }
            Err(e) => {
                state
                    .errors_total
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                crate::metrics::record_upstream_error("connection", &route.prefix);
                error!(error = %e, "upstream request failed");
                return error_response(
                    StatusCode::BAD_GATEWAY,
                    &format!("upstream error: {e}"),
                    &request_id,
                );
            }
        }
    }

    // Should be unreachable, but handle defensively
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "unexpected retry exhaustion",
        &request_id,
    )
}

/// Build the upstream URL for a matched route, honoring `strip_prefix` and
/// carrying the query string through untouched.
fn build_upstream_url(route: &Route, uri: &axum::http::Uri) -> String {
    let path = uri.path();
    let forwarded_path = if route.strip_prefix {
        let rest = path.strip_prefix(route.prefix.as_str()).unwrap_or(path);
        if rest.is_empty() { "/" } else { rest }
    } else {
        path
    };
    match uri.query() {
        Some(query) => format!("{}{}?{}", route.upstream_url, forwarded_path, query),
        None => format!("{}{}", route.upstream_url, forwarded_path),
    }
}

/// Check if a header is hop-by-hop (stripped before forwarding)
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn route(prefix: &str, upstream: &str, strip: bool) -> Route {
        Route {
            prefix: prefix.into(),
            upstream_url: upstream.trim_end_matches('/').into(),
            timeout: Duration::from_secs(5),
            strip_prefix: strip,
            authorization: None,
        }
    }

    fn state_with(routes: Vec<Route>) -> ProxyState {
        ProxyState {
            client: reqwest::Client::new(),
            routes: Arc::new(routes),
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    fn inbound(method: &str, uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn hop_by_hop_detection() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(is_hop_by_hop("keep-alive"));
        assert!(is_hop_by_hop("Proxy-Authorization"));
        assert!(!is_hop_by_hop("Content-Type"));
        assert!(!is_hop_by_hop("Authorization"));
        assert!(!is_hop_by_hop("X-Custom-Header"));
    }

    #[test]
    fn route_matching_respects_segment_boundaries() {
        let r = route("/es", "http://es:9200", true);
        assert!(r.matches("/es"));
        assert!(r.matches("/es/_search"));
        assert!(!r.matches("/essentials"));
        assert!(!r.matches("/api/es"));
    }

    #[test]
    fn longest_prefix_wins() {
        let routes = vec![
            route("/api", "http://backend:9000", false),
            route("/api/metrics", "http://metrics:9090", true),
        ];
        let matched = match_route(&routes, "/api/metrics/query").unwrap();
        assert_eq!(matched.prefix, "/api/metrics");
        let matched = match_route(&routes, "/api/alerts").unwrap();
        assert_eq!(matched.prefix, "/api");
    }

    #[test]
    fn no_route_is_none() {
        let routes = vec![route("/api", "http://backend:9000", false)];
        assert!(match_route(&routes, "/other").is_none());
    }

    #[test]
    fn upstream_url_strips_prefix_and_keeps_query() {
        let r = route("/es", "http://es:9200", true);
        let uri: axum::http::Uri = "/es/_search?size=10".parse().unwrap();
        assert_eq!(build_upstream_url(&r, &uri), "http://es:9200/_search?size=10");

        let bare: axum::http::Uri = "/es".parse().unwrap();
        assert_eq!(build_upstream_url(&r, &bare), "http://es:9200/");
    }

    #[test]
    fn upstream_url_keeps_prefix_when_configured() {
        let r = route("/api", "http://backend:9000", false);
        let uri: axum::http::Uri = "/api/alerts".parse().unwrap();
        assert_eq!(build_upstream_url(&r, &uri), "http://backend:9000/api/alerts");
    }

    #[tokio::test]
    async fn forwards_status_and_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_search"))
            .and(query_param("size", "5"))
            .respond_with(
                ResponseTemplate::new(418).set_body_string(r#"{"hits":[]}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = state_with(vec![route("/es", &server.uri(), true)]);
        let response = proxy_request(&state, inbound("GET", "/es/_search?size=5"), "req_test".into()).await;

        // Error statuses come back untouched — classification is the
        // client core's job.
        assert_eq!(response.status().as_u16(), 418);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"hits":[]}"#);
    }

    #[tokio::test]
    async fn strips_hop_by_hop_and_keeps_end_to_end_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-console-page", "traffic"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let state = state_with(vec![route("/api", &server.uri(), true)]);
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/api/flows")
            .header("x-console-page", "traffic")
            .header("proxy-authorization", "Basic leak")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = proxy_request(&state, request, "req_test".into()).await;
        assert_eq!(response.status().as_u16(), 200);

        // wiremock saw exactly one request; verify it had no hop-by-hop header
        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("proxy-authorization"));
    }

    #[tokio::test]
    async fn injects_route_authorization_when_client_sent_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Basic ZXM6cGFzcw=="))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut es_route = route("/es", &server.uri(), true);
        es_route.authorization = Some(Secret::new("Basic ZXM6cGFzcw==".into()));
        let state = state_with(vec![es_route]);

        let response = proxy_request(&state, inbound("GET", "/es/_cat/indices"), "req_test".into()).await;
        assert_eq!(response.status().as_u16(), 200);
        server.verify().await;
    }

    #[tokio::test]
    async fn client_authorization_is_never_clobbered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer client-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut api_route = route("/api", &server.uri(), true);
        api_route.authorization = Some(Secret::new("Basic should-not-win".into()));
        let state = state_with(vec![api_route]);

        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/api/alerts")
            .header("authorization", "Bearer client-token")
            .body(axum::body::Body::empty())
            .unwrap();

        let response = proxy_request(&state, request, "req_test".into()).await;
        assert_eq!(response.status().as_u16(), 200);
        server.verify().await;
    }

    #[tokio::test]
    async fn unrouted_path_is_404_with_error_envelope() {
        let state = state_with(vec![route("/api", "http://backend:9000", false)]);
        let response = proxy_request(&state, inbound("GET", "/nowhere"), "req_test".into()).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.errors_total.load(Ordering::Relaxed), 1);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"]["type"], "proxy_error");
        assert_eq!(parsed["error"]["request_id"], "req_test");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_bad_gateway() {
        // Port 1 on localhost refuses connections
        let state = state_with(vec![route("/api", "http://127.0.0.1:1", false)]);
        let response = proxy_request(&state, inbound("GET", "/api/alerts"), "req_test".into()).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn error_envelope_shape() {
        let resp = error_response(StatusCode::GATEWAY_TIMEOUT, "upstream timeout", "req_abc");
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
