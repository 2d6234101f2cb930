//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum entries kept in the signal log.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Lifetime of a non-persistent alert.
    #[serde(default = "default_alert_ttl_ms")]
    pub alert_ttl_ms: u64,
    /// Periodic status poll interval (0 = only the initial fetch).
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,
    /// Upper bound for an operator command. Taken from the `[api]` section.
    #[serde(skip, default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_log_capacity() -> usize {
    50
}

fn default_alert_ttl_ms() -> u64 {
    6000
}

fn default_status_poll_interval_ms() -> u64 {
    5000
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            alert_ttl_ms: default_alert_ttl_ms(),
            status_poll_interval_ms: default_status_poll_interval_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl SessionConfig {
    pub fn alert_ttl(&self) -> Duration {
        Duration::from_millis(self.alert_ttl_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// `None` when periodic polling is disabled.
    pub fn status_poll_interval(&self) -> Option<Duration> {
        (self.status_poll_interval_ms > 0)
            .then(|| Duration::from_millis(self.status_poll_interval_ms))
    }
}
