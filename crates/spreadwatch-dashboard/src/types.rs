//! Dashboard API types.
//!
//! These types are used for JSON serialization in REST and WebSocket APIs.

use serde::Serialize;
use spreadwatch_core::HistoricalPoint;
use spreadwatch_session::SessionSnapshot;

/// WebSocket message types (tagged enum for type safety).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardMessage {
    /// Full snapshot (sent on connect).
    Snapshot(SessionSnapshot),
    /// Published snapshot change.
    Update(SessionSnapshot),
}

/// `GET /api/historical` body.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalResponse {
    pub count: usize,
    pub points: Vec<HistoricalPoint>,
}

/// `POST /api/historical/reload` body.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub count: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}
