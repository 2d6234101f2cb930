//! Push channel events.
//!
//! A `PushMessage` is one Socket.IO event after the framing in
//! `socketio` has been stripped: the event name and its first argument.

use serde::{Deserialize, Serialize};

pub const EVENT_CONNECTED: &str = "connected";
pub const EVENT_STRATEGY_UPDATE: &str = "strategy_update";
pub const EVENT_ERROR: &str = "error";

/// Classified event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEventKind {
    Connected,
    StrategyUpdate,
    Error,
    Other,
}

/// One push channel event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PushMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn kind(&self) -> PushEventKind {
        match self.event.as_str() {
            EVENT_CONNECTED => PushEventKind::Connected,
            EVENT_STRATEGY_UPDATE => PushEventKind::StrategyUpdate,
            EVENT_ERROR => PushEventKind::Error,
            _ => PushEventKind::Other,
        }
    }

    /// Human-readable text of an `error` event's payload.
    pub fn error_text(&self) -> String {
        match &self.data {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| self.data.to_string()),
            other => other.to_string(),
        }
    }
}
