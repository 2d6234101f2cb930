//! Liveness tracking for the push channel.
//!
//! Engine.IO servers ping the client every `pingInterval` and expect a pong
//! within `pingTimeout`. The client mirrors that contract: if nothing at all
//! arrives for `interval + timeout` the connection is declared dead.
//!
//! Owned by a single connection task, so no interior locking is needed.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Liveness state for one live connection.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    last_ping: Option<Instant>,
    last_message: Instant,
}

impl HeartbeatMonitor {
    /// Create a monitor. An interval of zero disables liveness checks.
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            last_ping: None,
            last_message: Instant::now(),
        }
    }

    /// Adopt the timing announced in the server's open packet.
    ///
    /// Has no effect on a disabled monitor or when the server announced no
    /// interval.
    pub fn apply_server_timing(&mut self, interval_ms: u64, timeout_ms: u64) {
        if !self.is_enabled() || interval_ms == 0 {
            return;
        }
        self.interval = Duration::from_millis(interval_ms);
        self.timeout = Duration::from_millis(timeout_ms);
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Period between health checks (half the interval).
    pub fn check_period(&self) -> Duration {
        (self.interval / 2).max(Duration::from_millis(1))
    }

    /// Record a server ping.
    pub fn record_ping(&mut self) {
        let now = Instant::now();
        if let Some(previous) = self.last_ping {
            let gap_ms = now.duration_since(previous).as_millis() as u64;
            debug!(gap_ms, "Received server ping");
        }
        self.last_ping = Some(now);
    }

    /// Record that any frame was received.
    pub fn record_message(&mut self) {
        self.last_message = Instant::now();
    }

    /// True when the server has been silent past its ping deadline.
    pub fn is_timed_out(&self) -> bool {
        self.is_enabled() && self.last_message.elapsed() > self.interval + self.timeout
    }

    pub fn last_ping(&self) -> Option<Instant> {
        self.last_ping
    }
}
