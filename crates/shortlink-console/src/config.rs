// Configuration for the console

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use shortlink_client::HttpClientConfig;

use crate::error::Result;

/// Console configuration.
///
/// Loaded from an optional file and `SHORTLINK_*` environment variables, e.g.
/// `SHORTLINK_HTTP__BASE_URL` or `SHORTLINK_POLL_INTERVAL_SECS`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Request pipeline settings
    pub http: HttpClientConfig,
    /// Interval between background invalidations (default: 30)
    pub poll_interval_secs: u64,
    /// Number of rows kept in the "recent URLs" view (default: 5)
    pub recent_urls_limit: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            poll_interval_secs: 30,
            recent_urls_limit: 5,
        }
    }
}

impl ConsoleConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClientConfig::new(base_url),
            ..Default::default()
        }
    }

    /// Load configuration from `path` (if any) overlaid with environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("SHORTLINK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_recent_urls_limit(mut self, limit: usize) -> Self {
        self.recent_urls_limit = limit;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.recent_urls_limit, 5);
        assert_eq!(config.http.request_timeout_ms, 10000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
poll_interval_secs = 10

[http]
base_url = "https://sho.rt"
csrf_ttl_secs = 120
"#
        )
        .unwrap();

        let config = ConsoleConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.recent_urls_limit, 5);
        assert_eq!(config.http.base_url, "https://sho.rt");
        assert_eq!(config.http.csrf_ttl_secs, 120);
        assert_eq!(config.http.api_prefix, "/api");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = ConsoleConfig::load(Some(Path::new("/nonexistent/shortlink.toml")));
        assert!(result.is_err());
    }
}
