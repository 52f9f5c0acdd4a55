//! Downstream dispatch: choosing an upstream and forwarding the request to it.
//!
//! ```text
//! /api/orders/7 ──▶ UpstreamRoutes::resolve ──▶ http://orders:8080
//!                                                  │
//!                        ProxyClient::forward ─────┘ (method, path, query, headers, body)
//! ```

pub mod client;
pub mod upstream;

pub use client::ProxyClient;
pub use upstream::UpstreamRoutes;
