//! Live session synchronizer for the remote spread strategy.
//!
//! Reconciles the pull-based REST API and the push channel into one
//! published `SessionSnapshot`:
//! - `SignalLogBuffer`: bounded, newest-first audit log of push events
//! - `AlertQueue`: single self-expiring operator alert
//! - `StrategyControlStateMachine`: gates initialize / start / stop
//! - `HistoricalSeriesLoader`: fetches and zips the historical series
//! - `Session`: handle to the coordinator actor that composes them

pub mod alert;
pub mod config;
pub mod control;
mod coordinator;
pub mod error;
pub mod history;
pub mod log_buffer;
pub mod session;

pub use alert::{Alert, AlertQueue, Severity};
pub use config::SessionConfig;
pub use control::{RunState, StrategyControlStateMachine};
pub use error::{SessionError, SessionResult};
pub use history::{zip_series, HistoricalSeriesLoader};
pub use log_buffer::SignalLogBuffer;
pub use session::{Session, SessionSnapshot};
