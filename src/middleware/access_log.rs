//! Access logging for the whole filter chain.
//!
//! Installed as the outermost stage, so it sees every request before any other
//! filter runs and every response after the upstream (or a rejecting filter)
//! has answered.
//!
//! # Records
//!
//! ```text
//! Incoming request: GET /api/orders from 10.0.0.5:51514
//!        │
//!        ▼  (rest of the chain)
//!        │
//! Outgoing response: GET /api/orders - Status: 401 - Duration: 3ms
//! ```
//!
//! If the response future is dropped first (client went away), a `cancelled`
//! entry without a status is written instead. This is best effort.
//!
//! The logger never changes the request or the response, and a failing sink
//! never affects what the caller receives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response, StatusCode};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{info, warn};

use super::REQUEST_ID_HEADER;
use crate::metrics;

/// Remote address recorded when the connection address is not known.
pub const UNKNOWN_ADDR: &str = "unknown";

/// How the rest of the chain finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// A response was produced (any status, including rejections).
    Completed,
    /// The inner service returned an error instead of a response.
    Failed,
    /// The response future was dropped before it resolved.
    Cancelled,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::Completed => "completed",
            Completion::Failed => "failed",
            Completion::Cancelled => "cancelled",
        }
    }
}

/// What is known about a request before dispatch.
#[derive(Debug, Clone)]
pub struct RequestStart {
    pub method: Method,
    pub path: String,
    pub remote_addr: String,
    pub started_at: DateTime<Utc>,
}

impl RequestStart {
    fn from_request<B>(req: &Request<B>) -> Self {
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| UNKNOWN_ADDR.to_string());

        Self {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
            remote_addr,
            started_at: Utc::now(),
        }
    }
}

/// One finished (or abandoned) request.
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub method: Method,
    pub path: String,
    pub remote_addr: String,
    /// `None` unless a response was produced.
    pub status: Option<StatusCode>,
    pub duration_ms: u64,
    pub request_id: Option<String>,
    pub completion: Completion,
}

#[derive(Debug, Error)]
pub enum AccessLogError {
    #[error("access log sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for access log records.
pub trait AccessLogSink: Send + Sync + 'static {
    fn on_request(&self, start: &RequestStart) -> Result<(), AccessLogError>;

    fn on_response(&self, entry: &AccessLogEntry) -> Result<(), AccessLogError>;
}

/// Writes access records as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AccessLogSink for TracingSink {
    fn on_request(&self, start: &RequestStart) -> Result<(), AccessLogError> {
        info!(
            method = %start.method,
            path = %start.path,
            remote_addr = %start.remote_addr,
            started_at = %start.started_at.to_rfc3339(),
            "Incoming request"
        );
        Ok(())
    }

    fn on_response(&self, entry: &AccessLogEntry) -> Result<(), AccessLogError> {
        let status = entry.status.map(|s| s.as_u16());
        match entry.completion {
            Completion::Completed => info!(
                method = %entry.method,
                path = %entry.path,
                status,
                duration_ms = entry.duration_ms,
                request_id = entry.request_id.as_deref(),
                "Outgoing response"
            ),
            Completion::Failed | Completion::Cancelled => warn!(
                method = %entry.method,
                path = %entry.path,
                outcome = entry.completion.as_str(),
                duration_ms = entry.duration_ms,
                "Request ended without a response"
            ),
        }
        Ok(())
    }
}

fn report(result: Result<(), AccessLogError>) {
    if let Err(e) = result {
        warn!(error = %e, "Access log sink failed");
    }
}

/// Access log layer for the Tower middleware stack.
#[derive(Clone)]
pub struct AccessLogLayer {
    sink: Arc<dyn AccessLogSink>,
}

impl AccessLogLayer {
    /// Log through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    pub fn with_sink(sink: Arc<dyn AccessLogSink>) -> Self {
        Self { sink }
    }
}

impl Default for AccessLogLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLogService {
            inner,
            sink: self.sink.clone(),
        }
    }
}

/// Access log service wrapper.
#[derive(Clone)]
pub struct AccessLogService<S> {
    inner: S,
    sink: Arc<dyn AccessLogSink>,
}

impl<S> Service<Request<Body>> for AccessLogService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let start = RequestStart::from_request(&req);
        report(self.sink.on_request(&start));

        // Created outside the future so a drop before the first poll still logs.
        let mut in_flight = InFlight {
            start: Some(start),
            clock: Instant::now(),
            sink: self.sink.clone(),
        };

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match inner.call(req).await {
                Ok(response) => {
                    let request_id = response
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    in_flight.finish(Some(response.status()), request_id, Completion::Completed);
                    Ok(response)
                }
                Err(e) => {
                    in_flight.finish(None, None, Completion::Failed);
                    Err(e)
                }
            }
        })
    }
}

/// A request between pre-log and post-log; logs `Cancelled` if dropped unfinished.
struct InFlight {
    start: Option<RequestStart>,
    clock: Instant,
    sink: Arc<dyn AccessLogSink>,
}

impl InFlight {
    fn finish(
        &mut self,
        status: Option<StatusCode>,
        request_id: Option<String>,
        completion: Completion,
    ) {
        let Some(start) = self.start.take() else {
            return;
        };
        let elapsed = self.clock.elapsed();

        let entry = AccessLogEntry {
            method: start.method,
            path: start.path,
            remote_addr: start.remote_addr,
            status,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            request_id,
            completion,
        };

        let status_label = match status {
            Some(s) => s.as_u16().to_string(),
            None => completion.as_str().to_string(),
        };
        metrics::record_request(
            entry.method.as_str(),
            &status_label,
            elapsed.as_secs_f64(),
        );

        report(self.sink.on_response(&entry));
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.finish(None, None, Completion::Cancelled);
    }
}
