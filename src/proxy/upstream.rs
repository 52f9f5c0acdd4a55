use crate::config::{Config, UpstreamRoute};

/// Ordered prefix table with an optional catch-all upstream.
#[derive(Debug, Clone, Default)]
pub struct UpstreamRoutes {
    routes: Vec<UpstreamRoute>,
    default: Option<String>,
}

impl UpstreamRoutes {
    pub fn new(routes: Vec<UpstreamRoute>, default: Option<String>) -> Self {
        Self { routes, default }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upstream_routes.clone(), config.upstream_url.clone())
    }

    /// Base URL for `path`: the first matching prefix, else the default.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|route| path.starts_with(&route.prefix))
            .map(|route| route.url.as_str())
            .or(self.default.as_deref())
    }
}
