//! Mock strategy REST server for integration tests.
//!
//! Serves fixed `/api/status` and `/api/historical` bodies, accepts
//! `/api/initialize`, rejects `/api/start` as uninitialized and answers
//! `/api/stop` too slowly.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct MockRestServer {
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl MockRestServer {
    pub async fn start() -> Self {
        let app = Router::new()
            .route("/api/status", get(status))
            .route("/api/historical", get(historical))
            .route("/api/initialize", post(initialize))
            .route("/api/start", post(start))
            .route("/api/stop", post(stop));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "is_running": false,
        "beta": 1.0342,
        "intercept": 2.81,
        "current_position": 0,
        "data_loaded": true,
        "data_count": 500
    }))
}

async fn historical() -> Json<Value> {
    Json(json!({
        "dates": ["2025-01-01", "2025-01-02"],
        "spread": [0.1, 0.2],
        "z_score": [0.5, 1.5],
        "cumulative_pnl": [0.0, 12.5],
        "positions": [0.0, 1.0]
    }))
}

async fn initialize() -> Json<Value> {
    Json(json!({"status": "success", "message": "Strategy initialized successfully"}))
}

async fn start() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": "Strategy not initialized"})),
    )
}

async fn stop() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({"status": "success", "message": "Strategy stopped"}))
}
