//! Shared application state for Axum handlers.
//!
//! Cloned per request; everything inside is either `Arc`-backed or cheap to
//! clone (`reqwest::Client` is itself a handle to a shared pool).

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::AppResult;
use crate::proxy::ProxyClient;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Upstream forwarding client
    pub proxy: ProxyClient,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the upstream client cannot be built.
    pub fn new(config: Config) -> AppResult<Self> {
        let proxy = ProxyClient::new(&config)?;

        Ok(Self {
            config: Arc::new(config),
            proxy,
            started_at: Instant::now(),
        })
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
