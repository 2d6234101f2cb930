//! Dashboard configuration.

use serde::{Deserialize, Serialize};

/// `[dashboard]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Enable dashboard server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Serve `GET /metrics`. Taken from the `[telemetry]` section.
    #[serde(skip, default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    10
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            max_connections: default_max_connections(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}
