//! Configuration for the HTTP request pipeline

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP client
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Server origin, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// Prefix prepended to every API path (default: "/api")
    pub api_prefix: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// How long a cached CSRF token is trusted, in seconds
    pub csrf_ttl_secs: u64,
    /// Responses slower than this are logged as slow
    pub slow_request_threshold_ms: u64,
    /// Login entry point the application is sent to when the session ends
    pub login_path: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_prefix: "/api".to_string(),
            connect_timeout_ms: 5000,
            request_timeout_ms: 10000,
            csrf_ttl_secs: 300,
            slow_request_threshold_ms: 1000,
            login_path: "/login".to_string(),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config for a single server origin
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Set the API prefix
    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        self.api_prefix = prefix.to_string();
        self
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connect_ms: u64, request_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.request_timeout_ms = request_ms;
        self
    }

    /// Set CSRF token cache lifetime
    pub fn with_csrf_ttl(mut self, secs: u64) -> Self {
        self.csrf_ttl_secs = secs;
        self
    }

    /// Set slow request logging threshold
    pub fn with_slow_request_threshold(mut self, ms: u64) -> Self {
        self.slow_request_threshold_ms = ms;
        self
    }

    /// Set the login entry point
    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = path.to_string();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn csrf_ttl(&self) -> Duration {
        Duration::from_secs(self.csrf_ttl_secs)
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_threshold_ms)
    }
}
