//! Bearer-token authentication filter.
//!
//! # Decision Flow
//!
//! ```text
//! normalize path (resolve `.`/`..`, rewrite URI) ──fails──▶ Reject 400
//!      │
//!      ▼
//! path public? ──yes──▶ Continue (caller-sent X-User-* removed)
//!      │no
//!      ▼
//! Authorization present? ──no──▶ Reject 401 "Missing authorization header"
//!      │yes
//!      ▼
//! "Bearer <token>"? ──no──▶ Reject 401 "Invalid authorization header"
//!      │yes
//!      ▼
//! token verifies? ──no──▶ Reject 401 "Invalid or expired token"
//!      │yes
//!      ▼
//! Continue with X-User-Id / X-User-Role / X-User-Email set from the claims
//! ```
//!
//! # Security Features
//!
//! - **Identity headers only come from the gateway**: they are overwritten on
//!   authenticated requests and removed from public ones
//! - **Checked path is forwarded path**: dot segments are resolved before
//!   classification, so `/api/novels/../orders` is treated as `/api/orders`
//! - **No verification oracle**: malformed, forged, expired and not-yet-valid
//!   tokens all produce the same response; the reason is only logged
//! - **Fail closed**: a claim that cannot be encoded as a header rejects the
//!   request instead of forwarding it without identity

use std::borrow::Cow;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, HeaderValue, Request, Response, Uri, header};
use axum::response::IntoResponse;
use thiserror::Error;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use super::outcome::{FilterOutcome, Rejection};
use crate::auth::paths::normalize_path;
use crate::auth::{Claims, PublicPaths, TokenError, TokenVerifier};
use crate::config::Config;
use crate::metrics;

/// Header carrying the verified subject downstream.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the verified role downstream.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Header carrying the verified email downstream.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

const IDENTITY_HEADERS: [&str; 3] = [USER_ID_HEADER, USER_ROLE_HEADER, USER_EMAIL_HEADER];

/// Authorization scheme prefix (case-sensitive, including the space).
pub const BEARER_PREFIX: &str = "Bearer ";

/// Internal reason an authentication attempt failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request path cannot be normalized")]
    PathInvalid,

    #[error("missing Authorization header")]
    HeaderMissing,

    #[error("Authorization header is not a bearer credential")]
    HeaderMalformed,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("claim `{0}` cannot be carried in a header")]
    IdentityHeader(&'static str),
}

impl AuthError {
    /// The response the caller sees. Token problems and internal faults share one.
    pub fn rejection(&self) -> Rejection {
        match self {
            AuthError::PathInvalid => Rejection::invalid_path(),
            AuthError::HeaderMissing => Rejection::missing_authorization(),
            AuthError::HeaderMalformed => Rejection::invalid_authorization(),
            AuthError::Token(_) | AuthError::IdentityHeader(_) => Rejection::invalid_token(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            AuthError::PathInvalid => "invalid_path",
            AuthError::HeaderMissing => "missing_header",
            AuthError::HeaderMalformed => "invalid_header",
            AuthError::Token(TokenError::Malformed(_)) => "token_malformed",
            AuthError::Token(TokenError::SignatureInvalid) => "token_signature",
            AuthError::Token(TokenError::Expired { .. }) => "token_expired",
            AuthError::Token(TokenError::NotYetValid { .. }) => "token_not_yet_valid",
            AuthError::IdentityHeader(_) => "identity_header",
        }
    }
}

/// Decides, per request, whether it may proceed and with which identity.
#[derive(Debug, Clone)]
pub struct AuthenticationFilter {
    verifier: TokenVerifier,
    public_paths: PublicPaths,
}

impl AuthenticationFilter {
    pub fn new(verifier: TokenVerifier, public_paths: PublicPaths) -> Self {
        Self {
            verifier,
            public_paths,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            TokenVerifier::new(config.jwt_secret.as_bytes(), config.token_leeway_secs),
            PublicPaths::new(config.public_paths.clone()),
        )
    }

    pub fn public_paths(&self) -> &PublicPaths {
        &self.public_paths
    }

    /// Run the authentication decision for one request.
    ///
    /// The request URI is first rewritten to its normalized path; the outcome
    /// carries the rewritten request.
    pub fn process<B>(&self, mut request: Request<B>) -> FilterOutcome<B> {
        if let Err(err) = normalize_uri(&mut request) {
            warn!(uri = %request.uri(), decision = "deny", "Request path cannot be normalized");
            metrics::record_auth_decision(err.label());
            return FilterOutcome::Reject(err.rejection());
        }

        let path = request.uri().path().to_owned();
        debug!(path = %path, "Processing request");

        if self.public_paths.is_public(&path) {
            strip_identity(request.headers_mut());
            debug!(path = %path, decision = "public", "Public path, skipping authentication");
            metrics::record_auth_decision("public");
            return FilterOutcome::Continue(request);
        }

        match self.authenticate(&mut request) {
            Ok(claims) => {
                debug!(
                    path = %path,
                    decision = "allow",
                    subject = claims.subject(),
                    "Authentication successful"
                );
                metrics::record_auth_decision("allow");
                FilterOutcome::Continue(request)
            }
            Err(err) => {
                match &err {
                    AuthError::PathInvalid => {
                        warn!(path = %path, decision = "deny", "Invalid request path");
                    }
                    AuthError::HeaderMissing => {
                        warn!(path = %path, decision = "deny", "Missing Authorization header");
                    }
                    AuthError::HeaderMalformed => {
                        warn!(path = %path, decision = "deny", "Invalid Authorization header format");
                    }
                    AuthError::Token(e) => {
                        error!(path = %path, decision = "deny", error = %e, "JWT validation failed");
                    }
                    AuthError::IdentityHeader(claim) => {
                        error!(
                            path = %path,
                            decision = "deny",
                            claim,
                            "Verified claim cannot be propagated, rejecting"
                        );
                    }
                }
                metrics::record_auth_decision(err.label());
                FilterOutcome::Reject(err.rejection())
            }
        }
    }

    fn authenticate<B>(&self, request: &mut Request<B>) -> Result<Claims, AuthError> {
        let claims = {
            let token = bearer_token(request.headers())?;
            self.verifier.verify(token)?
        };
        inject_identity(request.headers_mut(), &claims)?;
        Ok(claims)
    }
}

/// Rewrite the request URI to its normalized path, keeping the query.
fn normalize_uri<B>(request: &mut Request<B>) -> Result<(), AuthError> {
    let rewritten = {
        let uri = request.uri();
        let Cow::Owned(path) = normalize_path(uri.path()) else {
            return Ok(());
        };
        debug!(raw = uri.path(), normalized = %path, "Resolved dot segments in request path");

        let path_and_query = match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(
            path_and_query
                .parse::<PathAndQuery>()
                .map_err(|_| AuthError::PathInvalid)?,
        );
        Uri::from_parts(parts).map_err(|_| AuthError::PathInvalid)?
    };

    *request.uri_mut() = rewritten;
    Ok(())
}

/// Drop caller-supplied identity headers; only the gateway may set them.
fn strip_identity(headers: &mut HeaderMap) {
    for name in IDENTITY_HEADERS {
        if headers.remove(name).is_some() {
            debug!(header = name, "Removed caller-supplied identity header");
        }
    }
}

/// Extract the token from the first `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::HeaderMissing)?;
    let value = value.to_str().map_err(|_| AuthError::HeaderMalformed)?;

    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::HeaderMalformed),
    }
}

/// Overwrite the identity headers with the verified claims.
///
/// All values are encoded before any header is touched, so on error the
/// request is left as it was.
fn inject_identity(headers: &mut HeaderMap, claims: &Claims) -> Result<(), AuthError> {
    let encode = |claim: &'static str, value: &str| {
        HeaderValue::from_str(value).map_err(|_| AuthError::IdentityHeader(claim))
    };

    let user_id = encode("sub", claims.subject())?;
    let role = encode("role", claims.role())?;
    let email = encode("email", claims.email())?;

    headers.insert(USER_ID_HEADER, user_id);
    headers.insert(USER_ROLE_HEADER, role);
    headers.insert(USER_EMAIL_HEADER, email);
    Ok(())
}

/// Bearer authentication layer.
#[derive(Clone)]
pub struct JwtAuthLayer {
    filter: Arc<AuthenticationFilter>,
}

impl JwtAuthLayer {
    pub fn new(filter: AuthenticationFilter) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }
}

impl<S> Layer<S> for JwtAuthLayer {
    type Service = JwtAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JwtAuthService {
            inner,
            filter: self.filter.clone(),
        }
    }
}

/// Bearer authentication service wrapper.
#[derive(Clone)]
pub struct JwtAuthService<S> {
    inner: S,
    filter: Arc<AuthenticationFilter>,
}

impl<S> Service<Request<Body>> for JwtAuthService<S>
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
        // The decision is fully resolved before the inner service is touched.
        let outcome = self.filter.process(req);

        // Use the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match outcome {
                FilterOutcome::Continue(req) => inner.call(req).await,
                FilterOutcome::Reject(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}
