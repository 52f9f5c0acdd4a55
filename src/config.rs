//! Gateway configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded once at startup from environment variables (or a
//! `.env` file) and is immutable afterwards. The token verifier and the public
//! path classifier receive their slice of it explicitly; nothing reads ambient
//! state at request time.
//!
//! # Security Configuration
//!
//! - `JWT_SECRET` (required): symmetric HMAC key, at least 32 bytes
//! - `TOKEN_LEEWAY_SECS`: clock skew tolerated for `exp`/`nbf` (default: 0)
//! - `PUBLIC_PATHS`: comma-separated path prefixes exempt from authentication
//!
//! # Upstream Configuration
//!
//! - `UPSTREAM_URL`: default downstream base URL
//! - `UPSTREAM_ROUTES`: comma-separated `prefix=url` pairs, first match wins
//! - `UPSTREAM_TIMEOUT_SECS`: per-request upstream timeout (default: 30)
//! - `MAX_REQUEST_BODY_SIZE`: largest request body forwarded (default: 10MB)

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Minimum HMAC key length in bytes (256 bits, the HS256 floor).
pub const MIN_SECRET_LEN: usize = 32;

/// Public path prefixes used when `PUBLIC_PATHS` is not set.
pub const DEFAULT_PUBLIC_PATHS: [&str; 5] = [
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/refresh",
    "/api/novels",
    "/actuator/health",
];

/// A static upstream route: requests whose path starts with `prefix` go to `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRoute {
    pub prefix: String,
    pub url: String,
}

/// Gateway configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Gateway will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Symmetric signing secret shared with the token issuer
    pub jwt_secret: String,

    /// Seconds of clock skew tolerated when checking `exp` and `nbf`
    pub token_leeway_secs: u64,

    /// Path prefixes that bypass authentication.
    /// Security note: prefix matching means `/api/novels` also exempts
    /// `/api/novels-admin`. Choose prefixes with a trailing segment boundary
    /// in mind.
    pub public_paths: Vec<String>,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Default upstream base URL (used when no route prefix matches)
    pub upstream_url: Option<String>,

    /// Prefix-based upstream routes, checked in order
    pub upstream_routes: Vec<UpstreamRoute>,

    /// Timeout for a single upstream exchange (default: 30 seconds)
    pub upstream_timeout: Duration,

    /// Maximum request body size forwarded upstream (default: 10MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("token_leeway_secs", &self.token_leeway_secs)
            .field("public_paths", &self.public_paths)
            .field("upstream_url", &self.upstream_url)
            .field("upstream_routes", &self.upstream_routes)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("log_level", &self.log_level)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `JWT_SECRET` is missing or too short,
    /// a numeric value does not parse, or no upstream is configured.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,

            // Authentication
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AppError::ConfigError("JWT_SECRET is required".to_string()))?,
            token_leeway_secs: Self::parse_env("TOKEN_LEEWAY_SECS", 0)?,
            public_paths: env::var("PUBLIC_PATHS")
                .map(|raw| parse_public_paths(&raw))
                .unwrap_or_else(|_| default_public_paths()),

            // Upstream
            upstream_url: env::var("UPSTREAM_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            upstream_routes: parse_upstream_routes(
                &env::var("UPSTREAM_ROUTES").unwrap_or_default(),
            )?,
            upstream_timeout: Duration::from_secs(Self::parse_env("UPSTREAM_TIMEOUT_SECS", 30)?),
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?, // 10MB

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AppError::ConfigError(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes (got {})",
                self.jwt_secret.len()
            )));
        }

        if self.upstream_url.is_none() && self.upstream_routes.is_empty() {
            return Err(AppError::ConfigError(
                "either UPSTREAM_URL or UPSTREAM_ROUTES must be set".to_string(),
            ));
        }

        let urls = self
            .upstream_url
            .iter()
            .chain(self.upstream_routes.iter().map(|r| &r.url));
        for url in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::ConfigError(format!(
                    "upstream URL must start with http:// or https://: {url}"
                )));
            }
        }

        if self.upstream_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

fn default_public_paths() -> Vec<String> {
    DEFAULT_PUBLIC_PATHS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

/// Parse a comma-separated list of public path prefixes.
///
/// Entries that are empty or do not start with `/` are dropped.
pub fn parse_public_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s.starts_with('/'))
        .collect()
}

/// Parse `prefix=url` pairs separated by commas.
///
/// # Errors
///
/// Returns `AppError::ConfigError` for an entry without `=` or with an empty side.
pub fn parse_upstream_routes(raw: &str) -> AppResult<Vec<UpstreamRoute>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, url) = entry.split_once('=').ok_or_else(|| {
                AppError::ConfigError(format!("Invalid UPSTREAM_ROUTES entry: {entry}"))
            })?;
            let prefix = prefix.trim();
            let url = url.trim().trim_end_matches('/');
            if !prefix.starts_with('/') || url.is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Invalid UPSTREAM_ROUTES entry: {entry}"
                )));
            }
            Ok(UpstreamRoute {
                prefix: prefix.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Default configuration for testing and development.
///
/// The secret is empty, so `validate()` fails until one is supplied.
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: String::new(),
            token_leeway_secs: 0,
            public_paths: default_public_paths(),
            upstream_url: None,
            upstream_routes: Vec::new(),
            upstream_timeout: Duration::from_secs(30),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}
