//! REST response bodies for status polling and control commands.

use serde::{Deserialize, Serialize};

/// Response of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatus {
    /// Whether the remote strategy loop is running.
    pub is_running: bool,
    /// Hedge ratio from the last initialization.
    #[serde(default)]
    pub beta: Option<f64>,
    /// Regression intercept from the last initialization.
    #[serde(default)]
    pub intercept: Option<f64>,
    /// Current strategy position (-1, 0, 1).
    #[serde(default)]
    pub current_position: i64,
    /// Whether the remote holds a loaded dataset.
    #[serde(default)]
    pub data_loaded: bool,
    /// Number of rows in the remote dataset.
    #[serde(default)]
    pub data_count: u64,
}

impl StrategyStatus {
    /// The remote counts as initialized once its dataset is loaded or a
    /// hedge ratio exists. A hedge ratio of exactly zero is reported as
    /// `null`, so `beta` alone is not enough.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.data_loaded || self.beta.is_some()
    }
}

/// Body returned by the command endpoints (`/initialize`, `/start`, `/stop`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}
