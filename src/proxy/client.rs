//! HTTP forwarding to upstream services.
//!
//! # Features
//!
//! - Connection pooling and TCP keep-alive via a shared `reqwest::Client`
//! - Per-request timeout from `UPSTREAM_TIMEOUT_SECS`
//! - Request bodies buffered up to `MAX_REQUEST_BODY_SIZE`
//! - Response bodies streamed to the caller as they arrive, never buffered
//! - Hop-by-hop headers dropped in both directions
//!
//! Redirects are returned to the caller, never followed.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderMap};
use axum::http::{Request, Response};
use tracing::{debug, warn};

use super::UpstreamRoutes;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics;

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards requests to the upstream selected by path prefix.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    routes: UpstreamRoutes,
    max_body_size: usize,
}

impl ProxyClient {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            routes: UpstreamRoutes::from_config(config),
            max_body_size: config.max_request_body_size,
        })
    }

    /// Forward `request` and relay the upstream answer unchanged.
    ///
    /// The response body is a stream; an upstream failure after the headers
    /// were relayed ends that stream with an error.
    ///
    /// # Errors
    ///
    /// - `NoRoute` when no upstream serves the path
    /// - `BadRequest` when the body exceeds the size limit
    /// - `UpstreamTimeout` / `UpstreamUnavailable` when the exchange fails
    pub async fn forward(&self, request: Request<Body>) -> AppResult<Response<Body>> {
        let path = request.uri().path();
        let base = self
            .routes
            .resolve(path)
            .ok_or_else(|| AppError::NoRoute(path.to_string()))?;

        let target = match request.uri().query() {
            Some(query) => format!("{base}{path}?{query}"),
            None => format!("{base}{path}"),
        };

        let (mut parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| {
                debug!(error = %e, "Failed to buffer request body");
                AppError::BadRequest("Request body too large or unreadable".to_string())
            })?;

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);
        // Recomputed from the buffered body
        parts.headers.remove(header::CONTENT_LENGTH);

        debug!(method = %parts.method, upstream = %target, "Forwarding request upstream");

        let mut outbound = self
            .client
            .request(parts.method, &target)
            .headers(parts.headers);
        if !body.is_empty() {
            outbound = outbound.body(body);
        }

        let upstream = outbound
            .send()
            .await
            .map_err(|e| upstream_error(e, &target))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn upstream_error(err: reqwest::Error, target: &str) -> AppError {
    if err.is_timeout() {
        warn!(upstream = %target, "Upstream timed out");
        metrics::record_upstream_error("timeout");
        AppError::UpstreamTimeout(target.to_string())
    } else {
        warn!(upstream = %target, error = %err, "Upstream request failed");
        metrics::record_upstream_error("unavailable");
        AppError::UpstreamUnavailable(err.to_string())
    }
}
