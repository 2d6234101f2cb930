//! Control state machine for the remote strategy.
//!
//! Every command is checked against the transition table before any side
//! effect. While a command is in flight the machine sits in a transient
//! state and remembers where to roll back to on failure.

use crate::error::{SessionError, SessionResult};
use serde::Serialize;
use spreadwatch_core::{StrategyCommand, StrategyStatus};
use spreadwatch_ws::ConnectionState;
use tracing::{debug, info, warn};

/// Believed run state of the remote strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// The remote reported a contradictory status.
    Faulted,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Faulted => "faulted",
        }
    }

    /// A command is in flight.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Initializing | Self::Starting | Self::Stopping)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    command: StrategyCommand,
    rollback: RunState,
}

#[derive(Debug)]
pub struct StrategyControlStateMachine {
    state: RunState,
    pending: Option<Pending>,
}

impl Default for StrategyControlStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyControlStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Uninitialized,
            pending: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn pending_command(&self) -> Option<StrategyCommand> {
        self.pending.map(|p| p.command)
    }

    /// Check `command` against the table without changing state.
    pub fn check(&self, command: StrategyCommand, connection: ConnectionState) -> SessionResult<()> {
        use crate::control::RunState::*;

        let invalid = || SessionError::InvalidTransition {
            command,
            state: self.state,
        };

        match (command, self.state) {
            (StrategyCommand::Initialize, Uninitialized | Initialized | Stopped | Faulted) => Ok(()),
            (StrategyCommand::Start, Uninitialized) => Err(SessionError::PreconditionFailed {
                command,
                reason: "strategy not initialized".to_string(),
            }),
            (StrategyCommand::Start, Initialized | Stopped) => {
                if connection == ConnectionState::Connected {
                    Ok(())
                } else {
                    Err(SessionError::PreconditionFailed {
                        command,
                        reason: format!("push channel is {connection}"),
                    })
                }
            }
            (StrategyCommand::Stop, Running) => Ok(()),
            _ => Err(invalid()),
        }
    }

    /// Enter the transient state for `command`.
    pub fn begin(&mut self, command: StrategyCommand, connection: ConnectionState) -> SessionResult<RunState> {
        self.check(command, connection)?;

        let transient = match command {
            StrategyCommand::Initialize => RunState::Initializing,
            StrategyCommand::Start => RunState::Starting,
            StrategyCommand::Stop => RunState::Stopping,
        };
        self.pending = Some(Pending {
            command,
            rollback: self.state,
        });
        debug!(%command, from = %self.state, to = %transient, "Command started");
        self.state = transient;
        Ok(transient)
    }

    /// Settle the in-flight command.
    ///
    /// The connection precondition applies when a command begins, not when
    /// it settles: a start the remote confirms lands in Running even if the
    /// push channel dropped while it was in flight.
    pub fn complete(&mut self, command: StrategyCommand, success: bool) -> RunState {
        let Some(pending) = self.pending.take() else {
            warn!(%command, state = %self.state, "Completion without pending command");
            return self.state;
        };
        if pending.command != command {
            warn!(%command, pending = %pending.command, "Completion for a different command");
        }

        self.state = if success {
            match pending.command {
                StrategyCommand::Initialize => RunState::Initialized,
                StrategyCommand::Start => RunState::Running,
                StrategyCommand::Stop => RunState::Stopped,
            }
        } else {
            pending.rollback
        };
        info!(command = %pending.command, success, state = %self.state, "Command settled");
        self.state
    }

    /// Reconcile belief with an observed remote status.
    ///
    /// Returns the states entered, in order. No-op while a command is in
    /// flight.
    pub fn reconcile(&mut self, observed: &StrategyStatus, connection: ConnectionState) -> Vec<RunState> {
        use crate::control::RunState::*;

        if self.state.is_transient() || self.pending.is_some() {
            return Vec::new();
        }

        let initialized = observed.is_initialized();
        let running = observed.is_running;
        let mut entered = Vec::new();

        if running && !initialized {
            if self.state != Faulted {
                warn!(state = %self.state, "Remote reports running without initialization");
                entered.push(Faulted);
            }
        } else {
            if !initialized && !running && self.state != Uninitialized {
                entered.push(Uninitialized);
            }
            if initialized && matches!(self.state, Uninitialized | Faulted) {
                entered.push(Initialized);
            }
            let base = entered.last().copied().unwrap_or(self.state);
            if running && matches!(base, Initialized | Stopped) && connection == ConnectionState::Connected {
                if base != Initialized {
                    entered.push(Initialized);
                }
                entered.push(Running);
            }
            if !running && base == Running {
                entered.push(Stopped);
            }
        }

        if let Some(&last) = entered.last() {
            info!(from = %self.state, to = %last, "Reconciled run state with remote status");
            self.state = last;
        }
        entered
    }
}
