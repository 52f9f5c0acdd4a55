//! Filter chain stages for the gateway edge.
//!
//! - **Access Log**: pre/post logging of every request, outermost
//! - **JWT Authentication**: bearer token verification and identity headers
//!
//! # Architecture
//!
//! ```text
//! Request → Access Log → Sensitive Headers → Request ID → JWT Auth → Router → Upstream
//!               ↓                                              ↓
//!          log + metrics                                 401 Rejection
//! ```
//!
//! # Security Considerations
//!
//! - Identity headers are always overwritten on authenticated requests so a
//!   client cannot pre-supply them
//! - Rejections never say why a token failed; the reason goes to the log only
//! - `Authorization` is marked sensitive so it is redacted from trace output

pub mod access_log;
pub mod auth;
pub mod outcome;

/// Header carrying the per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub use access_log::{
    AccessLogEntry, AccessLogError, AccessLogLayer, AccessLogSink, Completion, RequestStart,
    TracingSink,
};
pub use auth::{
    AuthError, AuthenticationFilter, JwtAuthLayer, USER_EMAIL_HEADER, USER_ID_HEADER,
    USER_ROLE_HEADER,
};
pub use outcome::{FilterOutcome, Rejection};
