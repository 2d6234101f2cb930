//! Single-slot operator alert with auto-expiry.
//!
//! A new alert always replaces the current one and restarts the deadline,
//! so expiry is measured from the visible alert's own `show`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use spreadwatch_telemetry::Metrics;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    /// Persistent alerts stay until dismissed or replaced.
    pub persistent: bool,
}

#[derive(Debug)]
pub struct AlertQueue {
    current: Option<Alert>,
    deadline: Option<Instant>,
    ttl: Duration,
}

impl AlertQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: None,
            deadline: None,
            ttl,
        }
    }

    /// Show an alert that expires after the configured TTL.
    pub fn show(&mut self, message: impl Into<String>, severity: Severity) {
        self.replace(message.into(), severity, false);
        self.deadline = Some(Instant::now() + self.ttl);
    }

    /// Show an alert with no expiry.
    pub fn show_persistent(&mut self, message: impl Into<String>, severity: Severity) {
        self.replace(message.into(), severity, true);
        self.deadline = None;
    }

    fn replace(&mut self, message: String, severity: Severity, persistent: bool) {
        if let Some(previous) = &self.current {
            debug!(previous = %previous.message, "Alert preempted");
        }
        Metrics::alert(severity.as_str());
        self.current = Some(Alert {
            message,
            severity,
            created_at: Utc::now(),
            persistent,
        });
    }

    /// Clear the alert and cancel its deadline.
    pub fn dismiss(&mut self) {
        self.current = None;
        self.deadline = None;
    }

    pub fn current(&self) -> Option<&Alert> {
        self.current.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves when the current alert's deadline passes. Never resolves
    /// while no deadline is pending.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Clear the alert if its deadline has passed. Returns whether it did.
    pub fn clear_expired(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.dismiss();
                true
            }
            _ => false,
        }
    }
}
