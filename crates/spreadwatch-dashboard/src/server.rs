//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use spreadwatch_core::{CommandReply, StrategyCommand, StrategyStatus};
use spreadwatch_session::{Session, SessionSnapshot};
use spreadwatch_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::broadcast::run_broadcaster;
use crate::config::DashboardConfig;
use crate::error::{ApiFailure, DashboardError, DashboardResult};
use crate::types::{DashboardMessage, HistoricalResponse, ReloadResponse};

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

/// Holds one connection slot until dropped.
pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Session>,
    broadcast_tx: broadcast::Sender<String>,
    connection_limiter: Arc<ConnectionLimiter>,
    config: DashboardConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        session: Arc<Session>,
        broadcast_tx: broadcast::Sender<String>,
        config: DashboardConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            broadcast_tx,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
            shutdown,
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/historical", get(get_historical))
        .route("/api/initialize", post(post_initialize))
        .route("/api/start", post(post_start))
        .route("/api/stop", post(post_stop))
        .route("/api/status/refresh", post(refresh_status))
        .route("/api/historical/reload", post(reload_historical))
        .route("/api/alert/dismiss", post(dismiss_alert))
        .route("/api/reconnect", post(reconnect))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Get current session snapshot as JSON.
async fn get_snapshot(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

async fn get_historical(State(state): State<AppState>) -> Json<HistoricalResponse> {
    let history = state.session.history();
    Json(HistoricalResponse {
        count: history.len(),
        points: history.as_ref().clone(),
    })
}

async fn post_initialize(State(state): State<AppState>) -> Result<Json<CommandReply>, ApiFailure> {
    run_command(&state, StrategyCommand::Initialize).await
}

async fn post_start(State(state): State<AppState>) -> Result<Json<CommandReply>, ApiFailure> {
    run_command(&state, StrategyCommand::Start).await
}

async fn post_stop(State(state): State<AppState>) -> Result<Json<CommandReply>, ApiFailure> {
    run_command(&state, StrategyCommand::Stop).await
}

async fn run_command(
    state: &AppState,
    command: StrategyCommand,
) -> Result<Json<CommandReply>, ApiFailure> {
    info!(%command, "Dashboard command");
    Ok(Json(state.session.command(command).await?))
}

async fn refresh_status(State(state): State<AppState>) -> Result<Json<StrategyStatus>, ApiFailure> {
    Ok(Json(state.session.refresh_status().await?))
}

async fn reload_historical(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, ApiFailure> {
    let count = state.session.load_history().await?;
    Ok(Json(ReloadResponse { count }))
}

async fn dismiss_alert(State(state): State<AppState>) -> Result<StatusCode, ApiFailure> {
    state.session.dismiss_alert().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Restart the push channel with a fresh retry budget.
async fn reconnect(State(state): State<AppState>) -> Result<StatusCode, ApiFailure> {
    state.session.reconnect().await?;
    Ok(StatusCode::ACCEPTED)
}

/// Prometheus text exposition.
async fn get_metrics(State(state): State<AppState>) -> Response {
    if !state.config.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match Metrics::encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.config.max_connections,
            "WebSocket connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Handle a WebSocket connection. The slot is released when `_guard` drops.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no publish is missed
    let mut broadcast_rx = state.broadcast_tx.subscribe();

    let initial_msg = DashboardMessage::Snapshot(state.session.snapshot());
    if let Ok(json) = serde_json::to_string(&initial_msg) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            debug!("Failed to send initial snapshot, client disconnected");
            return;
        }
    }

    // Incoming messages only matter for close; pong is handled by axum
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!("Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Each update is a full snapshot, so the next one catches up
                        warn!(skipped = n, "WebSocket client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
        }
    }
    incoming_task.abort();

    info!(
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "WebSocket connection closed"
    );
}

/// Serve the dashboard on an already-bound listener until `shutdown`.
pub async fn serve(
    listener: TcpListener,
    session: Arc<Session>,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    // Full snapshots are small; 32 covers a burst of publishes
    let (broadcast_tx, _) = broadcast::channel::<String>(32);
    let local = shutdown.child_token();

    let state = AppState::new(session.clone(), broadcast_tx.clone(), config, local.clone());
    let app = create_router(state);

    let broadcaster = tokio::spawn(run_broadcaster(
        session.subscribe(),
        broadcast_tx,
        local.clone(),
    ));

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Dashboard server listening");
    }
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(local.clone().cancelled_owned())
        .await;

    local.cancel();
    if let Err(e) = broadcaster.await {
        warn!(?e, "Dashboard broadcaster ended abnormally");
    }
    info!("Dashboard server stopped");
    result.map_err(DashboardError::Serve)
}

/// Bind `0.0.0.0:{port}` and run the dashboard HTTP server.
pub async fn run_server(
    session: Arc<Session>,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Starting dashboard server");

    let listener = TcpListener::bind(addr).await.map_err(DashboardError::Bind)?;
    serve(listener, session, config, shutdown).await
}
