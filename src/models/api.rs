//! Response bodies produced by the gateway itself.
//!
//! Everything else on the wire is either relayed from an upstream untouched or
//! is a fixed authentication rejection.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Liveness response for `GET /actuator/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"UP"` while the process is serving
    pub status: String,
    /// Gateway version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Seconds since the gateway started
    pub uptime_seconds: u64,
}
