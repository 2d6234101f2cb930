//! Audit log rows derived from push events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::{Signal, StrategyUpdate, TradeActionKind};

/// One row of the signal/trade log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local receipt time of the push event.
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub action: TradeActionKind,
    pub details: String,
    /// z-score with three decimals.
    pub z_score_text: String,
}

impl LogEntry {
    /// Derive a log row from a push payload received at `received_at`.
    #[must_use]
    pub fn from_update(update: &StrategyUpdate, received_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: received_at,
            signal: update.signal_data.signal,
            action: update.trade_action.action,
            details: update.trade_action.details.clone(),
            z_score_text: update.signal_data.z_score_text(),
        }
    }
}
