//! Operator commands accepted by the remote strategy.

use serde::{Deserialize, Serialize};

/// Operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCommand {
    Initialize,
    Start,
    Stop,
}

impl StrategyCommand {
    pub const ALL: [StrategyCommand; 3] = [Self::Initialize, Self::Start, Self::Stop];

    /// Path of the command endpoint, relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Initialize => "/initialize",
            Self::Start => "/start",
            Self::Stop => "/stop",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for StrategyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
