use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Gateway-level error types with appropriate HTTP status codes.
///
/// Authentication failures are *not* represented here: the authentication
/// filter answers with its own fixed [`Rejection`](crate::middleware::Rejection)
/// bodies. These variants cover configuration and downstream dispatch.
///
/// # Upstream Errors
///
/// - `UpstreamUnavailable` - Connection refused, reset, or unreadable response (502)
/// - `UpstreamTimeout` - The upstream did not answer in time (504)
/// - `NoRoute` - No upstream is configured for the request path (404)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("No upstream route for path: {0}")]
    NoRoute(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for gateway-generated errors.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::UpstreamUnavailable(_) => (
                StatusCode::BAD_GATEWAY,
                "bad_gateway",
                "Downstream service is unavailable. Please try again later.",
            ),
            AppError::UpstreamTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "gateway_timeout",
                "Downstream service did not respond in time. Please try again.",
            ),
            AppError::NoRoute(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "No service is available for this path.",
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Gateway configuration error. Please contact support.",
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
