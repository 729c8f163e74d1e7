use std::time::Duration;

use crate::api::retry::RetryConfig;

/// Upload size ceilings.
pub const MODEL_MAX_BYTES: u64 = 50 * 1024 * 1024;
pub const DATASET_MAX_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub system_refresh_secs: u64,
    pub request_timeout_secs: u64,
    pub fetch_retries: u32,
    pub fetch_retry_base_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_ms: 2000,
            max_poll_attempts: 150,
            system_refresh_secs: 60,
            request_timeout_secs: 30,
            fetch_retries: 3,
            fetch_retry_base_ms: 250,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.api_base_url),
            poll_interval_ms: env_parse("POLL_INTERVAL_MS").unwrap_or(d.poll_interval_ms),
            max_poll_attempts: env_parse("MAX_POLL_ATTEMPTS").unwrap_or(d.max_poll_attempts),
            system_refresh_secs: env_parse("SYSTEM_REFRESH_SECS").unwrap_or(d.system_refresh_secs),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(d.request_timeout_secs),
            fetch_retries: env_parse("FETCH_RETRIES").unwrap_or(d.fetch_retries),
            fetch_retry_base_ms: env_parse("FETCH_RETRY_BASE_MS").unwrap_or(d.fetch_retry_base_ms),
        }
    }

    pub fn poll(&self) -> PollConfig {
        PollConfig {
            period: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_attempts: self.max_poll_attempts,
        }
    }

    pub fn system_refresh(&self) -> Duration {
        Duration::from_secs(self.system_refresh_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.fetch_retries,
            base_delay_ms: self.fetch_retry_base_ms,
            ..RetryConfig::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Poll loop cadence. The timeout is attempt-counted, so it scales with
/// `period`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub period: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Config::default().poll()
    }
}

impl PollConfig {
    pub fn timeout(&self) -> Duration {
        self.period * self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_timeout_is_five_minutes() {
        let poll = PollConfig::default();
        assert_eq!(poll.period, Duration::from_millis(2000));
        assert_eq!(poll.max_attempts, 150);
        assert_eq!(poll.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn timeout_scales_with_period() {
        let cfg = Config { poll_interval_ms: 500, ..Config::default() };
        assert_eq!(cfg.poll().timeout(), Duration::from_secs(75));
    }

    #[test]
    fn fetch_retry_carries_overrides() {
        let cfg = Config { fetch_retries: 5, fetch_retry_base_ms: 10, ..Config::default() };
        let retry = cfg.fetch_retry();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay_ms, 10);
    }
}
