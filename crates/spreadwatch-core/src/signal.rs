//! Strategy signal types carried by the `strategy_update` push event.
//!
//! The remote strategy emits one `SignalEvent` and the `TradeAction` it
//! produced in the same payload. Both are immutable once parsed.

use serde::{Deserialize, Serialize};

/// Spread trading signal.
///
/// Upstream uses `HOLD` for "no signal"; it is read as `NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// z-score below the lower band: buy Brent, sell WTI.
    #[serde(rename = "LONG")]
    Long,
    /// z-score above the upper band: sell Brent, buy WTI.
    #[serde(rename = "SHORT")]
    Short,
    /// z-score back inside the exit band with an open position.
    #[serde(rename = "CLOSE")]
    Close,
    /// No actionable signal.
    #[serde(rename = "NONE", alias = "HOLD")]
    None,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Close => write!(f, "CLOSE"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Action the remote strategy took in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeActionKind {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "CLOSE")]
    Close,
    #[serde(rename = "NONE", alias = "HOLD")]
    None,
}

impl std::fmt::Display for TradeActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Close => write!(f, "CLOSE"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// One signal evaluation of the remote strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Upstream evaluation time (ISO-8601, as sent).
    pub timestamp: String,
    /// Last Brent price.
    pub brent_price: f64,
    /// Last WTI price.
    pub wti_price: f64,
    /// Hedged spread: brent - (beta * wti + intercept).
    pub spread: f64,
    /// Spread z-score over the rolling window.
    pub z_score: f64,
    /// Signal derived from the z-score.
    pub signal: Signal,
    /// Rolling spread mean, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_mean: Option<f64>,
    /// Rolling spread standard deviation, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_std: Option<f64>,
    /// Strategy position at evaluation time (-1, 0, 1), when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_position: Option<i64>,
}

impl SignalEvent {
    /// z-score rendered with three decimals, as shown in the log.
    #[must_use]
    pub fn z_score_text(&self) -> String {
        format!("{:.3}", self.z_score)
    }
}

/// Trade action paired with the signal that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeAction {
    pub action: TradeActionKind,
    pub details: String,
}

/// Payload of the `strategy_update` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyUpdate {
    pub signal_data: SignalEvent,
    pub trade_action: TradeAction,
}

impl StrategyUpdate {
    /// Parse from the event's `data` value.
    pub fn from_value(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upstream_payload() -> serde_json::Value {
        json!({
            "signal_data": {
                "timestamp": "2025-03-04T10:15:30.123456",
                "brent_price": 71.42,
                "wti_price": 68.10,
                "spread": 0.8731,
                "spread_mean": 0.1,
                "spread_std": 0.35,
                "z_score": 2.2089,
                "signal": "SHORT",
                "current_position": -1
            },
            "trade_action": {
                "action": "SELL",
                "details": "Short spread: Sell Brent, Buy WTI"
            }
        })
    }

    #[test]
    fn test_parse_strategy_update() {
        let update = StrategyUpdate::from_value(&upstream_payload()).unwrap();
        assert_eq!(update.signal_data.signal, Signal::Short);
        assert_eq!(update.signal_data.current_position, Some(-1));
        assert_eq!(update.trade_action.action, TradeActionKind::Sell);
        assert_eq!(update.signal_data.z_score_text(), "2.209");
    }

    #[test]
    fn test_hold_reads_as_none() {
        let mut payload = upstream_payload();
        payload["signal_data"]["signal"] = json!("HOLD");
        payload["trade_action"]["action"] = json!("HOLD");

        let update = StrategyUpdate::from_value(&payload).unwrap();
        assert_eq!(update.signal_data.signal, Signal::None);
        assert_eq!(update.trade_action.action, TradeActionKind::None);
    }

    #[test]
    fn test_optional_fields_absent() {
        let payload = json!({
            "signal_data": {
                "timestamp": "2025-03-04T10:15:30",
                "brent_price": 71.0,
                "wti_price": 68.0,
                "spread": 0.0,
                "z_score": -0.25,
                "signal": "CLOSE"
            },
            "trade_action": {"action": "CLOSE", "details": "Close all positions"}
        });

        let update = StrategyUpdate::from_value(&payload).unwrap();
        assert_eq!(update.signal_data.spread_mean, None);
        assert_eq!(update.signal_data.current_position, None);
        assert_eq!(update.signal_data.z_score_text(), "-0.250");
    }

    #[test]
    fn test_unknown_signal_rejected() {
        let mut payload = upstream_payload();
        payload["signal_data"]["signal"] = json!("MAYBE");
        assert!(StrategyUpdate::from_value(&payload).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Signal::Long.to_string(), "LONG");
        assert_eq!(Signal::None.to_string(), "NONE");
        assert_eq!(TradeActionKind::Buy.to_string(), "BUY");
    }
}
