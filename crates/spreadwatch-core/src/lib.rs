//! Core domain types for the spreadwatch strategy console.
//!
//! This crate provides the types shared by the push channel, the REST client
//! and the session coordinator:
//! - `SignalEvent`, `TradeAction`: one `strategy_update` push payload
//! - `StrategyStatus`: the `/status` poll response
//! - `HistoricalSeries`, `HistoricalPoint`: the `/historical` response and its zipped form
//! - `LogEntry`: derived, immutable audit log row
//! - `StrategyCommand`: operator commands (initialize / start / stop)

pub mod command;
pub mod history;
pub mod log;
pub mod signal;
pub mod status;

pub use command::StrategyCommand;
pub use history::{HistoricalPoint, HistoricalSeries};
pub use log::LogEntry;
pub use signal::{Signal, SignalEvent, StrategyUpdate, TradeAction, TradeActionKind};
pub use status::{CommandReply, StrategyStatus};
