use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    /// `None` disables periodic refresh.
    pub poll_interval: Option<Duration>,
    pub log_level: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| get(key).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default);
        let poll_secs = secs("STUDMATCH_POLL_INTERVAL_SECS", 0);
        Self {
            api_base_url: get("STUDMATCH_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout: Duration::from_secs(secs("STUDMATCH_REQUEST_TIMEOUT_SECS", 15).max(1)),
            poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
