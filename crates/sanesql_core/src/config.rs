//! Facade configuration.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Configuration for a [`SaneSql`](crate::SaneSql) facade.
///
/// Deserializes from a map whose durations are given in milliseconds:
///
/// ```json
/// { "lock_timeout_ms": 500, "probe_timeout_ms": 2000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long `scoped()` waits for the session registry lock.
    #[serde(rename = "lock_timeout_ms", deserialize_with = "millis")]
    pub lock_timeout: Duration,

    /// Upper bound for the connection liveness probe.
    #[serde(rename = "probe_timeout_ms", deserialize_with = "millis")]
    pub probe_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session registry lock timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the liveness probe timeout.
    #[must_use]
    pub const fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.lock_timeout, Duration::from_secs(1));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .lock_timeout(Duration::from_millis(50))
            .probe_timeout(Duration::from_millis(250));

        assert_eq!(config.lock_timeout, Duration::from_millis(50));
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
    }

    #[test]
    fn deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"lock_timeout_ms": 300}"#).unwrap();
        assert_eq!(config.lock_timeout, Duration::from_millis(300));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }
}
