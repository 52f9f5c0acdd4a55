//! Outcome of a filter stage and the fixed rejection responses.

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Message for a request without an `Authorization` header.
pub const MISSING_AUTHORIZATION: &str = "Missing authorization header";

/// Message for an `Authorization` header that is not `Bearer <token>`.
pub const INVALID_AUTHORIZATION: &str = "Invalid authorization header";

/// Message for every token failure, and for any internal fault while authenticating.
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Message for a path that cannot be rewritten to its normalized form.
pub const INVALID_PATH: &str = "Invalid request path";

/// What a filter stage decided for one request.
///
/// A `Reject` ends the chain: no later stage and no upstream dispatch runs.
#[derive(Debug)]
pub enum FilterOutcome<B = Body> {
    /// Hand the (possibly mutated) request to the rest of the chain.
    Continue(Request<B>),
    /// Answer the caller directly.
    Reject(Rejection),
}

impl<B> FilterOutcome<B> {
    pub fn is_reject(&self) -> bool {
        matches!(self, FilterOutcome::Reject(_))
    }
}

/// A short-circuit response produced by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: &'static str,
}

impl Rejection {
    pub const fn unauthorized(message: &'static str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message,
        }
    }

    pub const fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    pub const fn invalid_path() -> Self {
        Self::bad_request(INVALID_PATH)
    }

    pub const fn missing_authorization() -> Self {
        Self::unauthorized(MISSING_AUTHORIZATION)
    }

    pub const fn invalid_authorization() -> Self {
        Self::unauthorized(INVALID_AUTHORIZATION)
    }

    pub const fn invalid_token() -> Self {
        Self::unauthorized(INVALID_TOKEN)
    }

    /// Body sent to the caller: `{"error": "<message>", "status": <code>}`.
    ///
    /// Messages are fixed constants, so no JSON escaping is needed.
    pub fn body(&self) -> String {
        format!(
            r#"{{"error": "{}", "status": {}}}"#,
            self.message,
            self.status.as_u16()
        )
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            self.body(),
        )
            .into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
