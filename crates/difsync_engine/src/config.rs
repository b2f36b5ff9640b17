//! Configuration for a sync session.

use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Configuration for a [`SyncSession`](crate::SyncSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Gateway address (`http://…`, `https://…` or `telnet://host:port`).
    pub gateway: String,
    /// Shortest pause between cycles.
    pub min_sync_interval: Duration,
    /// Longest pause between cycles.
    pub max_sync_interval: Duration,
    /// Pause before the second cycle; adapted from then on.
    pub initial_sync_interval: Duration,
    /// Connect and read timeout for one exchange.
    pub timeout: Duration,
    /// Namespace prefix put in front of every document id on the wire.
    pub id_prefix: String,
    /// Cookie header sent with every exchange.
    pub cookie: Option<String>,
    /// Whether registering a document starts the background worker.
    /// Hosts that drive cycles themselves turn this off.
    pub background: bool,
}

impl SessionConfig {
    /// Creates a configuration with default timings.
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            min_sync_interval: Duration::from_secs(1),
            max_sync_interval: Duration::from_secs(10),
            initial_sync_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            id_prefix: String::new(),
            cookie: None,
            background: true,
        }
    }

    /// Sets the interval bounds.
    pub fn with_interval_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.min_sync_interval = min;
        self.max_sync_interval = max;
        self
    }

    /// Sets the initial interval.
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_sync_interval = interval;
        self
    }

    /// Sets the exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the id prefix.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Sets the cookie header.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Enables or disables the background worker.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Checks the configuration for inconsistent values.
    pub fn validate(&self) -> SyncResult<()> {
        if self.min_sync_interval > self.max_sync_interval {
            return Err(SyncError::InvalidConfig(format!(
                "min sync interval {:?} exceeds max {:?}",
                self.min_sync_interval, self.max_sync_interval
            )));
        }
        if self.timeout.is_zero() {
            return Err(SyncError::InvalidConfig("timeout must be non-zero".into()));
        }
        if self.id_prefix.contains(['\n', '\r']) {
            return Err(SyncError::InvalidConfig(
                "id prefix must not contain line breaks".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_builder() {
        let config = SessionConfig::new("http://localhost:8000/scripts/q.py")
            .with_interval_bounds(Duration::from_millis(500), Duration::from_secs(5))
            .with_initial_interval(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(10))
            .with_id_prefix("app_")
            .with_cookie("sid=1")
            .with_background(false);

        assert_eq!(config.gateway, "http://localhost:8000/scripts/q.py");
        assert_eq!(config.min_sync_interval, Duration::from_millis(500));
        assert_eq!(config.max_sync_interval, Duration::from_secs(5));
        assert_eq!(config.initial_sync_interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.id_prefix, "app_");
        assert_eq!(config.cookie.as_deref(), Some("sid=1"));
        assert!(!config.background);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.min_sync_interval, Duration::from_secs(1));
        assert_eq!(config.max_sync_interval, Duration::from_secs(10));
        assert_eq!(config.initial_sync_interval, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.id_prefix.is_empty());
        assert!(config.cookie.is_none());
        assert!(config.background);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let config = SessionConfig::default()
            .with_interval_bounds(Duration::from_secs(5), Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = SessionConfig::default().with_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
