//! Session error types.

use crate::control::RunState;
use spreadwatch_api::ApiError;
use spreadwatch_core::StrategyCommand;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Push channel could not be (re)established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// REST call failed: non-2xx, network, decode or timeout.
    #[error("Request failed: {0}")]
    Request(#[from] ApiError),

    #[error("Malformed historical series: {field} has {actual} entries, expected {expected}")]
    MalformedSeries {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot {command} while {state}")]
    InvalidTransition {
        command: StrategyCommand,
        state: RunState,
    },

    #[error("Cannot {command}: {reason}")]
    PreconditionFailed {
        command: StrategyCommand,
        reason: String,
    },

    #[error("Session closed")]
    SessionClosed,
}

impl SessionError {
    /// Whether the command was rejected before any network effect.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::PreconditionFailed { .. }
        )
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
