//! Client configuration, passed explicitly into [`crate::GitHubClient::new`].

use std::time::Duration;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Settings for the HTTP transport and request shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, without a trailing slash (GitHub Enterprise: `https://host/api/v3`).
    pub api_base_url: String,
    /// Sent as `User-Agent`; GitHub rejects requests without one.
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Total time allowed for one request, connection included.
    pub request_timeout: Duration,
    /// Page size for every listing call; GitHub caps it at 100.
    pub per_page: u8,
}

impl ClientConfig {
    /// Default settings against `api_base_url`.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: concat!("github-actions-exporter/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            per_page: 100,
        }
    }
}
