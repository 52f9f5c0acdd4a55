//! End-to-end tests: a real gateway in front of a real upstream.
//!
//! Each test starts an echo upstream and a gateway on ephemeral ports, then
//! talks to the gateway over HTTP. The echo upstream answers with a JSON
//! description of exactly what it received, so tests can assert on what the
//! filter chain forwarded.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use edge_gateway::config::UpstreamRoute;
use edge_gateway::middleware::{
    AccessLogEntry, AccessLogError, AccessLogLayer, AccessLogSink, RequestStart,
};
use edge_gateway::{AppState, Config, build_router_with};
use jsonwebtoken::{EncodingKey, Header};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Size of the `/blob` upstream response.
const BLOB_LEN: usize = 256 * 1024;

const SECRET: &str = "integration-secret-that-is-at-least-32-bytes";

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn token(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn valid_token() -> String {
    token(json!({
        "sub": "u1",
        "role": "reader",
        "email": "u1@x.com",
        "exp": now() + 3600,
    }))
}

// ============================================================================
// Echo upstream
// ============================================================================

#[derive(Clone, Default)]
struct Upstream {
    hits: Arc<AtomicUsize>,
}

async fn echo(
    State(upstream): State<Upstream>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    upstream.hits.fetch_add(1, Ordering::SeqCst);

    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                json!(value.to_str().unwrap_or("<binary>")),
            )
        })
        .collect();

    axum::Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn teapot() -> impl IntoResponse {
    (
        StatusCode::IM_A_TEAPOT,
        [("x-upstream", "kettle")],
        "short and stout",
    )
}

async fn blob() -> impl IntoResponse {
    let body: Vec<u8> = (0..BLOB_LEN).map(|i| (i % 251) as u8).collect();
    ([("content-type", "application/octet-stream")], body)
}

async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/status/teapot", get(teapot))
        .route("/blob", get(blob))
        .fallback(echo)
        .with_state(upstream.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), upstream)
}

/// An address nothing is listening on.
async fn dead_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

// ============================================================================
// Gateway fixture
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    starts: Mutex<Vec<RequestStart>>,
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl AccessLogSink for RecordingSink {
    fn on_request(&self, start: &RequestStart) -> Result<(), AccessLogError> {
        self.starts.lock().unwrap().push(start.clone());
        Ok(())
    }

    fn on_response(&self, entry: &AccessLogEntry) -> Result<(), AccessLogError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

struct Gateway {
    base_url: String,
    client: Client,
    access_log: Arc<RecordingSink>,
}

impl Gateway {
    async fn start(upstream_url: Option<String>, upstream_routes: Vec<UpstreamRoute>) -> Self {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: SECRET.to_string(),
            upstream_url,
            upstream_routes,
            upstream_timeout: Duration::from_secs(5),
            metrics_port: 0,
            log_level: "warn".to_string(),
            ..Config::default()
        };
        config.validate().expect("test config should be valid");

        let access_log = Arc::new(RecordingSink::default());
        let app = build_router_with(
            AppState::new(config).unwrap(),
            AccessLogLayer::with_sink(access_log.clone()),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            access_log,
        }
    }

    async fn in_front_of(upstream_url: String) -> Self {
        Self::start(Some(upstream_url), Vec::new()).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send `request_target` verbatim over a plain HTTP/1.1 connection.
    ///
    /// HTTP clients resolve dot segments before sending, so this is the
    /// only way to put `/a/../b` on the wire. Returns the status and body.
    async fn raw_get(&self, request_target: &str, extra_headers: &[(&str, &str)]) -> (u16, String) {
        let addr = self.base_url.trim_start_matches("http://");
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let mut request = format!("GET {request_target} HTTP/1.1\r\nHost: {addr}\r\n");
        for (name, value) in extra_headers {
            request.push_str(&format!("{name}: {value}\r\n"));
        }
        request.push_str("Connection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let raw = String::from_utf8_lossy(&raw).into_owned();

        let (head, body) = raw.split_once("\r\n\r\n").expect("response has a header block");
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("response has a status line");
        (status, body.to_string())
    }
}

async fn assert_rejected(response: reqwest::Response, message: &str) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body = response.text().await.unwrap();
    assert_eq!(body, format!(r#"{{"error": "{message}", "status": 401}}"#));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_is_public() {
    let (upstream_url, upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/actuator/health"))
        .send()
        .await
        .expect("Health request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "UP");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());
    // Served locally
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Public paths
// ============================================================================

#[tokio::test]
async fn test_public_path_forwarded_without_token() {
    let (upstream_url, upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/api/novels/42?page=2"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["path"], "/api/novels/42");
    assert_eq!(echoed["query"], "page=2");
    assert!(echoed["headers"].get("x-user-id").is_none());
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_public_path_drops_caller_identity_headers() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/api/novels/42"))
        .header("X-User-Id", "admin")
        .header("X-User-Role", "admin")
        .header("X-User-Email", "root@x.com")
        .header("X-Trace", "keep")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed: Value = response.json().await.unwrap();
    for name in ["x-user-id", "x-user-role", "x-user-email"] {
        assert!(echoed["headers"].get(name).is_none(), "{name} reached upstream");
    }
    assert_eq!(echoed["headers"]["x-trace"], "keep");
}

#[tokio::test]
async fn test_dot_segments_cannot_reach_protected_path() {
    let (upstream_url, upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    for target in [
        "/api/novels/../orders",
        "/api/novels/%2e%2e/orders",
        "/api/novels/.%2E/orders?all=1",
    ] {
        let (status, body) = gateway.raw_get(target, &[("X-User-Id", "admin")]).await;

        assert_eq!(status, 401, "{target} was not rejected");
        assert_eq!(
            body,
            r#"{"error": "Missing authorization header", "status": 401}"#
        );
    }
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dot_segments_forward_the_checked_path() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let (status, body) = gateway
        .raw_get("/api/orders/../novels/1?page=2", &[("X-User-Id", "admin")])
        .await;

    assert_eq!(status, 200);
    let echoed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(echoed["path"], "/api/novels/1");
    assert_eq!(echoed["query"], "page=2");
    assert!(echoed["headers"].get("x-user-id").is_none());
}

// ============================================================================
// Protected paths
// ============================================================================

#[tokio::test]
async fn test_expired_token_rejected_before_upstream() {
    let (upstream_url, upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;
    let expired = token(json!({"sub": "u1", "exp": now() - 60}));

    let response = gateway
        .client
        .post(gateway.url("/api/orders"))
        .bearer_auth(expired)
        .body(r#"{"item": 1}"#)
        .send()
        .await
        .unwrap();

    assert_rejected(response, "Invalid or expired token").await;
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_and_malformed_headers_rejected() {
    let (upstream_url, upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/api/orders"))
        .send()
        .await
        .unwrap();
    assert_rejected(response, "Missing authorization header").await;

    let response = gateway
        .client
        .get(gateway.url("/api/orders"))
        .header("authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap();
    assert_rejected(response, "Invalid authorization header").await;

    let response = gateway
        .client
        .get(gateway.url("/api/orders"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_rejected(response, "Invalid or expired token").await;

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_valid_token_forwards_identity_headers() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .post(gateway.url("/api/orders"))
        .bearer_auth(valid_token())
        .header("x-user-id", "admin")
        .header("x-user-role", "superuser")
        .body(r#"{"item": 1}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed: Value = response.json().await.unwrap();
    let headers = &echoed["headers"];
    // Client-supplied identity is replaced, never trusted
    assert_eq!(headers["x-user-id"], "u1");
    assert_eq!(headers["x-user-role"], "reader");
    assert_eq!(headers["x-user-email"], "u1@x.com");
    assert!(headers["authorization"].as_str().unwrap().starts_with("Bearer "));
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["body"], r#"{"item": 1}"#);
}

#[tokio::test]
async fn test_token_without_optional_claims_forwards_empty_headers() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/api/profile"))
        .bearer_auth(token(json!({"sub": "u2"})))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["headers"]["x-user-id"], "u2");
    assert_eq!(echoed["headers"]["x-user-role"], "");
    assert_eq!(echoed["headers"]["x-user-email"], "");
}

// ============================================================================
// Request IDs
// ============================================================================

#[tokio::test]
async fn test_request_id_generated_and_propagated() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/api/novels"))
        .send()
        .await
        .unwrap();

    let generated = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(!generated.is_empty());
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["headers"]["x-request-id"], generated.as_str());

    let response = gateway
        .client
        .get(gateway.url("/api/novels"))
        .header("x-request-id", "client-correlation-id")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "client-correlation-id");
}

#[tokio::test]
async fn test_rejection_carries_request_id() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/api/orders"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

// ============================================================================
// Upstream dispatch
// ============================================================================

#[tokio::test]
async fn test_upstream_status_and_headers_relayed() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/status/teapot"))
        .bearer_auth(valid_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-upstream"], "kettle");
    assert_eq!(response.text().await.unwrap(), "short and stout");
}

#[tokio::test]
async fn test_large_upstream_body_relayed_intact() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    let response = gateway
        .client
        .get(gateway.url("/blob"))
        .bearer_auth(valid_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-length"].to_str().unwrap(),
        BLOB_LEN.to_string()
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), BLOB_LEN);
    assert!(body.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));
}

#[tokio::test]
async fn test_prefix_routes_select_upstream() {
    let (novels_url, novels) = spawn_upstream().await;
    let (core_url, core) = spawn_upstream().await;
    let gateway = Gateway::start(
        Some(core_url),
        vec![UpstreamRoute {
            prefix: "/api/novels".to_string(),
            url: novels_url,
        }],
    )
    .await;

    gateway
        .client
        .get(gateway.url("/api/novels/1"))
        .send()
        .await
        .unwrap();
    gateway
        .client
        .get(gateway.url("/api/users/me"))
        .bearer_auth(valid_token())
        .send()
        .await
        .unwrap();

    assert_eq!(novels.hits.load(Ordering::SeqCst), 1);
    assert_eq!(core.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unrouted_path_is_not_found() {
    let (novels_url, _novels) = spawn_upstream().await;
    let gateway = Gateway::start(
        None,
        vec![UpstreamRoute {
            prefix: "/api/novels".to_string(),
            url: novels_url,
        }],
    )
    .await;

    let response = gateway
        .client
        .get(gateway.url("/api/orders"))
        .bearer_auth(valid_token())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let gateway = Gateway::in_front_of(dead_upstream().await).await;

    let response = gateway
        .client
        .get(gateway.url("/api/novels"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_gateway");
}

// ============================================================================
// Access log
// ============================================================================

#[tokio::test]
async fn test_access_log_records_every_outcome() {
    let (upstream_url, _upstream) = spawn_upstream().await;
    let gateway = Gateway::in_front_of(upstream_url).await;

    gateway
        .client
        .get(gateway.url("/api/novels/7"))
        .send()
        .await
        .unwrap();
    gateway
        .client
        .delete(gateway.url("/api/orders/7"))
        .send()
        .await
        .unwrap();

    let starts = gateway.access_log.starts.lock().unwrap();
    assert_eq!(starts.len(), 2);
    assert!(starts[0].remote_addr.starts_with("127.0.0.1:"));

    let entries = gateway.access_log.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path, "/api/novels/7");
    assert_eq!(entries[0].status, Some(StatusCode::OK));
    assert_eq!(entries[1].method, Method::DELETE);
    assert_eq!(entries[1].status, Some(StatusCode::UNAUTHORIZED));
    assert!(entries[1].request_id.is_some());
}
