//! Session test harness: a `Session` wired to scripted doubles.

use serde_json::{json, Value};
use spreadwatch_api::MockStrategyApi;
use spreadwatch_core::{HistoricalSeries, StrategyStatus};
use spreadwatch_session::{Session, SessionConfig, SessionSnapshot};
use spreadwatch_ws::{ConnectionConfig, MockTransport};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub session: Arc<Session>,
    pub api: Arc<MockStrategyApi>,
    pub transport: Arc<MockTransport>,
}

impl Harness {
    /// Session with periodic polling disabled.
    pub fn start(api: Arc<MockStrategyApi>, transport: Arc<MockTransport>) -> Self {
        Self::start_with(session_config(), api, transport)
    }

    pub fn start_with(
        config: SessionConfig,
        api: Arc<MockStrategyApi>,
        transport: Arc<MockTransport>,
    ) -> Self {
        let session = Session::spawn(config, push_config(), api.clone(), transport.clone());
        Self {
            session: Arc::new(session),
            api,
            transport,
        }
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        status_poll_interval_ms: 0,
        ..Default::default()
    }
}

pub fn push_config() -> ConnectionConfig {
    ConnectionConfig {
        url: "mock://strategy".to_string(),
        heartbeat_interval_ms: 0,
        ..Default::default()
    }
}

pub fn initialized_status(is_running: bool) -> StrategyStatus {
    StrategyStatus {
        is_running,
        beta: Some(1.03),
        intercept: Some(2.8),
        current_position: 0,
        data_loaded: true,
        data_count: 500,
    }
}

pub fn update_payload(z_score: f64, signal: &str, position: i64) -> Value {
    json!({
        "signal_data": {
            "timestamp": "2025-03-04T10:15:30",
            "brent_price": 71.42,
            "wti_price": 68.10,
            "spread": 0.87,
            "z_score": z_score,
            "signal": signal,
            "current_position": position
        },
        "trade_action": {"action": "SELL", "details": "Short spread: Sell Brent, Buy WTI"}
    })
}

pub fn series(n: usize) -> HistoricalSeries {
    HistoricalSeries {
        dates: (0..n).map(|i| format!("2025-01-{:02}", i + 1)).collect(),
        spread: vec![0.5; n],
        z_score: vec![1.0; n],
        cumulative_pnl: (0..n).map(|i| i as f64).collect(),
        positions: vec![1.0; n],
    }
}

/// Wait until the published snapshot satisfies `pred`.
pub async fn wait_for(
    session: &Session,
    what: &str,
    pred: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = session.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if pred(&snapshot) {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("session closed while waiting for {what}");
            }
        }
    })
    .await;
    waited.unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}
