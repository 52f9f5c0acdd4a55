//! # Edge Gateway
//!
//! The edge layer of an API gateway: every inbound request passes through an
//! ordered filter chain before it is forwarded to a downstream service.
//!
//! - **Authentication**: bearer JWT verification for everything outside a
//!   public-path allowlist, with fixed 401 rejections
//! - **Identity propagation**: verified `sub`/`role`/`email` forwarded as
//!   `X-User-Id`/`X-User-Role`/`X-User-Email`, never trusted from the client
//! - **Access logging**: one entry when a request arrives, one when it leaves
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Access Log → Sensitive Headers → Request ID → JWT Auth     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (/actuator/health, proxy fallback)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ProxyClient (prefix routing, reqwest)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Downstream services                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use edge_gateway::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr = config.server_addr();
//!     let app = build_router(AppState::new(config)?);
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! JWT_SECRET=change-me-to-at-least-32-bytes-long! \
//! UPSTREAM_URL=http://localhost:9000 \
//! UPSTREAM_ROUTES=/api/users=http://localhost:9001 \
//! cargo run
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use auth::{Claims, PublicPaths, TokenVerifier};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use middleware::{AccessLogLayer, AuthenticationFilter, FilterOutcome, Rejection};
pub use routes::{build_router, build_router_with};
pub use state::AppState;
