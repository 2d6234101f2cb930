//! Operator-facing session handle and published snapshot.

use crate::alert::Alert;
use crate::config::SessionConfig;
use crate::control::RunState;
use crate::coordinator::{Request, SessionCoordinator};
use crate::error::{SessionError, SessionResult};
use parking_lot::Mutex;
use serde::Serialize;
use spreadwatch_api::DynStrategyApi;
use spreadwatch_core::{
    CommandReply, HistoricalPoint, LogEntry, SignalEvent, StrategyCommand, StrategyStatus,
    TradeAction,
};
use spreadwatch_ws::{ConnectionConfig, ConnectionState, DynPushTransport};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Everything a reader needs to render the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Increments on every publish.
    pub version: u64,
    pub connection: ConnectionState,
    /// Automatic reconnection gave up; only `reconnect` resumes.
    pub reconnect_exhausted: bool,
    pub run_state: RunState,
    pub pending_command: Option<StrategyCommand>,
    /// Last `is_running` reported by the remote.
    pub remote_running: bool,
    pub current_signal: Option<SignalEvent>,
    pub current_action: Option<TradeAction>,
    pub beta: Option<f64>,
    pub intercept: Option<f64>,
    pub current_position: i64,
    pub data_loaded: bool,
    pub data_count: u64,
    /// Newest first.
    pub logs: Vec<LogEntry>,
    pub total_logs: u64,
    pub alert: Option<Alert>,
    pub history_len: usize,
    #[serde(skip)]
    pub history: Arc<Vec<HistoricalPoint>>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            connection: ConnectionState::Disconnected,
            reconnect_exhausted: false,
            run_state: RunState::Uninitialized,
            pending_command: None,
            remote_running: false,
            current_signal: None,
            current_action: None,
            beta: None,
            intercept: None,
            current_position: 0,
            data_loaded: false,
            data_count: 0,
            logs: Vec::new(),
            total_logs: 0,
            alert: None,
            history_len: 0,
            history: Arc::new(Vec::new()),
        }
    }
}

/// Handle to a running session.
///
/// Dropping the handle tears the session down; `shutdown` also waits for
/// the coordinator to finish.
pub struct Session {
    request_tx: mpsc::Sender<Request>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Spawn the coordinator and start connecting the push channel.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        push: ConnectionConfig,
        api: DynStrategyApi,
        transport: DynPushTransport,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let shutdown = CancellationToken::new();

        let coordinator = SessionCoordinator::new(
            config,
            push,
            api,
            transport,
            request_rx,
            snapshot_tx,
            shutdown.clone(),
        );
        let handle = tokio::spawn(coordinator.run());

        Self {
            request_tx,
            snapshot_rx,
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub async fn initialize(&self) -> SessionResult<CommandReply> {
        self.command(StrategyCommand::Initialize).await
    }

    pub async fn start(&self) -> SessionResult<CommandReply> {
        self.command(StrategyCommand::Start).await
    }

    pub async fn stop(&self) -> SessionResult<CommandReply> {
        self.command(StrategyCommand::Stop).await
    }

    /// Issue `command`. Rejections return before any network call.
    pub async fn command(&self, command: StrategyCommand) -> SessionResult<CommandReply> {
        self.call(|reply| Request::Command { command, reply }).await?
    }

    /// Fetch `/status` now. Returns the raw response; stale fields are
    /// not applied to the session.
    pub async fn refresh_status(&self) -> SessionResult<StrategyStatus> {
        self.call(|reply| Request::RefreshStatus { reply }).await?
    }

    /// Reload the historical series. Returns the number of points.
    pub async fn load_history(&self) -> SessionResult<usize> {
        self.call(|reply| Request::LoadHistory { reply }).await?
    }

    pub async fn dismiss_alert(&self) -> SessionResult<()> {
        self.send(Request::DismissAlert).await
    }

    /// Restart the push channel with a fresh retry budget.
    pub async fn reconnect(&self) -> SessionResult<()> {
        self.send(Request::Reconnect).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Currently loaded historical points.
    pub fn history(&self) -> Arc<Vec<HistoricalPoint>> {
        self.snapshot_rx.borrow().history.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.request_tx.is_closed()
    }

    /// Tear down and wait for the coordinator to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(?e, "Session coordinator ended abnormally");
            }
        }
    }

    async fn send(&self, request: Request) -> SessionResult<()> {
        self.request_tx
            .send(request)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> SessionResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(build(reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::SessionClosed)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
