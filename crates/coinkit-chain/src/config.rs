//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default ledger endpoint for local development.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Configuration for [`ChainClient`](crate::ChainClient).
///
/// Durations are stored in milliseconds so the struct reads naturally from
/// TOML; use the accessor methods for `Duration` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate endpoint base URLs. One is picked at random per request.
    pub endpoints: Vec<String>,
    /// Attempts per request before a transport failure is surfaced.
    pub retry_attempts: u32,
    /// Wait between failed attempts.
    pub retry_wait_ms: u64,
    /// Wait between polls while waiting for an operation to land.
    pub poll_interval_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_ms: u64,
    /// Give up waiting for an operation to land after this long.
    /// `None` waits indefinitely.
    pub consistency_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            retry_attempts: 3,
            retry_wait_ms: 1000,
            poll_interval_ms: 1000,
            request_timeout_ms: 10_000,
            consistency_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Use the given endpoints.
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Set the retry policy.
    pub fn with_retries(mut self, attempts: u32, wait: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_wait_ms = wait.as_millis() as u64;
        self
    }

    /// Set the consistency-wait poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Bound the consistency wait.
    pub fn with_consistency_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.consistency_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn consistency_timeout(&self) -> Option<Duration> {
        self.consistency_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoints, vec![DEFAULT_ENDPOINT.to_string()]);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.consistency_timeout(), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoints": ["http://a:1", "http://b:2"]}"#).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.retry_wait(), Duration::from_secs(1));
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::default()
            .with_retries(5, Duration::from_millis(10))
            .with_poll_interval(Duration::from_millis(20))
            .with_consistency_timeout(Some(Duration::from_secs(3)));
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.retry_wait(), Duration::from_millis(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.consistency_timeout(), Some(Duration::from_secs(3)));
    }
}
