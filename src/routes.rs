//! Application routing with the gateway filter chain.
//!
//! # Filter Chain (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────────┐
//! │     Access Log       │ ← logs start; logs end for every outcome, 401s included
//! └────────┬─────────────┘
//!          │
//!          ▼
//! ┌──────────────────────┐
//! │  Sensitive Headers   │ ← Authorization redacted from trace output
//! └────────┬─────────────┘
//!          │
//!          ▼
//! ┌──────────────────────┐
//! │     Request ID       │ ← X-Request-Id generated or kept, echoed on the response
//! └────────┬─────────────┘
//!          │
//!          ▼
//! ┌──────────────────────┐
//! │  JWT Authentication  │ ← 401 on reject (bypassed for public paths)
//! └────────┬─────────────┘
//!          │
//!          ▼
//!  /actuator/health  or  upstream (fallback)
//! ```
//!
//! `ServiceBuilder` applies layers top to bottom, so the order written in
//! [`build_router`] is the order a request travels.

use std::iter::once;

use axum::Router;
use axum::http::HeaderName;
use axum::http::header::AUTHORIZATION;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{AccessLogLayer, AuthenticationFilter, JwtAuthLayer, REQUEST_ID_HEADER};
use crate::state::AppState;

/// Build the gateway router with the full filter chain in place.
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, AccessLogLayer::new())
}

/// Same as [`build_router`] with a caller-supplied access log stage.
pub fn build_router_with(state: AppState, access_log: AccessLogLayer) -> Router {
    let config = &state.config;
    let filter = AuthenticationFilter::from_config(config);
    info!(
        public_paths = ?filter.public_paths().prefixes(),
        leeway_secs = config.token_leeway_secs,
        "JWT authentication enabled"
    );

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let chain = ServiceBuilder::new()
        .layer(access_log)
        .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(request_id))
        .layer(JwtAuthLayer::new(filter));

    Router::new()
        .route("/actuator/health", get(handlers::health_check))
        .fallback(handlers::forward)
        .layer(chain)
        .with_state(state)
}
