//! Client configuration.

use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.kycshield.ai";

/// Job polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status requests
    pub interval: Duration,
    /// Give up once polling has run this long
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            timeout: Duration::from_millis(120_000), // 2 minutes
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_millis("KYC_POLL_INTERVAL_MS").unwrap_or(defaults.interval),
            timeout: env_millis("KYC_POLL_TIMEOUT_MS").unwrap_or(defaults.timeout),
        }
    }
}

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, without trailing slash
    pub base_url: String,
    /// Request timeout (uploads included)
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Job polling configuration
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(300), // 5 minutes for video uploads
            connect_timeout: Duration::from_secs(10),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at a specific base URL, other fields defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            ..Self::default()
        }
    }

    /// Replace the base URL, keeping everything else.
    pub fn override_base_url(mut self, base_url: &str) -> ClientResult<Self> {
        if base_url.trim().is_empty() {
            return Err(ClientError::Config("base URL cannot be empty".to_string()));
        }
        self.base_url = normalize_base_url(base_url);
        Ok(self)
    }

    /// Create config from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let base_url = std::env::var("KYC_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        if base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "KYC_API_BASE_URL cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url: normalize_base_url(&base_url),
            timeout: Duration::from_secs(
                std::env::var("KYC_API_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("KYC_API_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            poll: PollConfig::from_env(),
        })
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "KYC_API_BASE_URL",
            "KYC_API_TIMEOUT_SECS",
            "KYC_API_CONNECT_TIMEOUT_SECS",
            "KYC_POLL_INTERVAL_MS",
            "KYC_POLL_TIMEOUT_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_poll_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.interval, Duration::from_millis(2000));
        assert_eq!(poll.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_base_url_normalized() {
        let config = ClientConfig::with_base_url("http://localhost:8000/ ");
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_override_base_url_keeps_timeouts() {
        let mut config = ClientConfig::default();
        config.timeout = Duration::from_secs(42);

        let config = config.override_base_url("https://staging.example.com/").unwrap();
        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.timeout, Duration::from_secs(42));

        assert!(ClientConfig::default().override_base_url(" ").is_err());
    }

    #[test]
    #[serial]
    fn test_config_defaults_from_env() {
        clear_env();
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.poll, PollConfig::default());
    }

    #[test]
    #[serial]
    fn test_config_rejects_empty_base_url() {
        clear_env();
        std::env::set_var("KYC_API_BASE_URL", "  ");
        assert!(ClientConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_parses_poll_env_vars() {
        clear_env();
        std::env::set_var("KYC_POLL_INTERVAL_MS", "500");
        std::env::set_var("KYC_POLL_TIMEOUT_MS", "10000");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.poll.timeout, Duration::from_secs(10));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_handles_invalid_env_values() {
        clear_env();
        std::env::set_var("KYC_API_CONNECT_TIMEOUT_SECS", "not-a-number");
        std::env::set_var("KYC_POLL_INTERVAL_MS", "0");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.poll.interval, Duration::from_millis(2000));
        clear_env();
    }
}
