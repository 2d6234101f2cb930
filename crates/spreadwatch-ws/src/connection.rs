//! Push channel connection manager.
//!
//! Handles the connection lifecycle, reconnection at a fixed delay with a
//! bounded attempt budget, and delivery of `ChannelEvent`s to the consumer.
//!
//! The server is a Socket.IO endpoint. A connection counts as up once the
//! default namespace acknowledges the client's `40`; opening the websocket
//! alone is not enough. Engine.IO pings are answered with pongs and double
//! as the liveness signal.
//!
//! Each `connect` starts a fresh run owned by its own cancellation token.
//! Cancelling the token is the only way a run stops emitting events, so a
//! replaced or disconnected run never reaches the consumer again.

use crate::error::WsError;
use crate::heartbeat::HeartbeatMonitor;
use crate::message::{PushEventKind, PushMessage};
use crate::socketio::{self, EnginePacket, OpenInfo, SocketPacket, DEFAULT_NAMESPACE, PONG_FRAME};
use crate::transport::{DynPushTransport, PushStream};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration (`[push]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Socket.IO server URL (`http(s)://` or an explicit `ws(s)://.../socket.io/` endpoint).
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum consecutive reconnection attempts (0 = infinite).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each reconnection attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Expected server ping interval until the open packet announces one
    /// (0 = liveness checks disabled).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Grace period after a missed ping before the connection is dropped.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// Deadline for the Engine.IO open packet and namespace ack.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_heartbeat_interval_ms() -> u64 {
    25_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    20_000
}

fn default_connect_timeout_ms() -> u64 {
    20_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Lifecycle and message events delivered to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected { reason: String },
    /// A `strategy_update` frame.
    Message(PushMessage),
    ChannelError(String),
    /// The retry budget ran out; no further attempts will be made.
    ReconnectExhausted { attempts: u32 },
}

struct ActiveRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Push channel connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    transport: DynPushTransport,
    state: Arc<RwLock<ConnectionState>>,
    reconnect_count: Arc<RwLock<u32>>,
    event_tx: mpsc::Sender<ChannelEvent>,
    active: Mutex<Option<ActiveRun>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(
        config: ConnectionConfig,
        transport: DynPushTransport,
        event_tx: mpsc::Sender<ChannelEvent>,
    ) -> Self {
        Self {
            config,
            transport,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            reconnect_count: Arc::new(RwLock::new(0)),
            event_tx,
            active: Mutex::new(None),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Current consecutive reconnection attempt (0 while connected).
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Endpoint configured for this manager.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Start connecting to `endpoint`, replacing any previous run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, endpoint: &str) {
        let token = CancellationToken::new();
        let run = RunContext {
            url: endpoint.to_string(),
            config: self.config.clone(),
            transport: self.transport.clone(),
            state: self.state.clone(),
            reconnect_count: self.reconnect_count.clone(),
            event_tx: self.event_tx.clone(),
            token: token.clone(),
        };

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            debug!("Replacing previous push channel run");
            previous.token.cancel();
        }
        *self.reconnect_count.write() = 0;
        *self.state.write() = ConnectionState::Connecting;
        let handle = tokio::spawn(run.run());
        *active = Some(ActiveRun { token, handle });
    }

    /// Tear down the connection. Idempotent.
    ///
    /// After this returns no further events from the torn-down run are
    /// delivered.
    pub fn disconnect(&self) {
        let Some(run) = self.active.lock().take() else {
            return;
        };
        info!("Push channel disconnect requested");
        run.token.cancel();
        *self.state.write() = ConnectionState::Disconnected;
        *self.reconnect_count.write() = 0;
    }

    /// Disconnect and wait for the run task to finish closing its stream.
    pub async fn shutdown(&self) {
        let run = self.active.lock().take();
        if let Some(run) = run {
            run.token.cancel();
            *self.state.write() = ConnectionState::Disconnected;
            if let Err(e) = run.handle.await {
                warn!(?e, "Push channel task ended abnormally");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(run) = self.active.get_mut().take() {
            run.token.cancel();
        }
    }
}

/// How one connection attempt ended.
enum SessionEnd {
    Cancelled,
    OpenFailed(WsError),
    /// The connection was up and then dropped.
    Lost(WsError),
}

enum Step {
    Cancelled,
    Frame(Option<Result<String, WsError>>),
    HeartbeatCheck,
}

/// State owned by one run task.
struct RunContext {
    url: String,
    config: ConnectionConfig,
    transport: DynPushTransport,
    state: Arc<RwLock<ConnectionState>>,
    reconnect_count: Arc<RwLock<u32>>,
    event_tx: mpsc::Sender<ChannelEvent>,
    token: CancellationToken,
}

impl RunContext {
    async fn run(self) {
        let mut attempt = 0u32;
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);

        loop {
            if self.token.is_cancelled() {
                return;
            }
            self.set_state(ConnectionState::Connecting);

            match self.session_once().await {
                SessionEnd::Cancelled => return,
                SessionEnd::OpenFailed(e) => {
                    warn!(attempt, error = %e, "Push channel connect failed");
                    self.set_state(ConnectionState::Disconnected);
                }
                SessionEnd::Lost(e) => {
                    warn!(error = %e, "Push channel connection lost");
                    self.set_state(ConnectionState::Disconnected);
                    // Each successful connection starts a fresh retry budget
                    attempt = 0;
                    if !matches!(e, WsError::ConnectionClosed { .. }) {
                        self.emit(ChannelEvent::ChannelError(e.to_string())).await;
                    }
                    self.emit(ChannelEvent::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;
                }
            }

            if self.token.is_cancelled() {
                return;
            }

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempts = attempt, "Max reconnection attempts reached");
                self.emit(ChannelEvent::ReconnectExhausted { attempts: attempt })
                    .await;
                return;
            }

            attempt += 1;
            self.set_reconnect_count(attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.token.cancelled() => {
                    info!("Disconnect requested during reconnect delay");
                    return;
                }
            }
        }
    }

    async fn session_once(&self) -> SessionEnd {
        let endpoint = socketio::endpoint_url(&self.url);
        info!(url = %endpoint, "Connecting to push channel");

        let opened = tokio::select! {
            result = self.transport.open(&endpoint) => result,
            () = self.token.cancelled() => return SessionEnd::Cancelled,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return SessionEnd::OpenFailed(e),
        };

        let deadline = Duration::from_millis(self.config.connect_timeout_ms);
        let greeted = tokio::select! {
            result = tokio::time::timeout(deadline, handshake(stream.as_mut())) => Some(result),
            () = self.token.cancelled() => None,
        };
        let open = match greeted {
            None => {
                stream.close().await;
                return SessionEnd::Cancelled;
            }
            Some(Ok(Ok(open))) => open,
            Some(Ok(Err(e))) => {
                stream.close().await;
                return SessionEnd::OpenFailed(e);
            }
            Some(Err(_)) => {
                stream.close().await;
                return SessionEnd::OpenFailed(WsError::Handshake(
                    "timed out waiting for namespace ack".to_string(),
                ));
            }
        };

        if !self.set_state(ConnectionState::Connected) {
            close_session(stream.as_mut()).await;
            return SessionEnd::Cancelled;
        }
        self.set_reconnect_count(0);
        info!(url = %endpoint, sid = %open.sid, "Push channel connected");
        self.emit(ChannelEvent::Connected).await;

        let end = self.message_loop(stream.as_mut(), &open).await;
        if matches!(end, SessionEnd::Cancelled) {
            info!("Closing push channel");
            close_session(stream.as_mut()).await;
        }
        end
    }

    async fn message_loop(&self, stream: &mut dyn PushStream, open: &OpenInfo) -> SessionEnd {
        let mut heartbeat = HeartbeatMonitor::new(
            self.config.heartbeat_interval_ms,
            self.config.heartbeat_timeout_ms,
        );
        heartbeat.apply_server_timing(open.ping_interval, open.ping_timeout);
        let heartbeat_enabled = heartbeat.is_enabled();
        let check_period = heartbeat.check_period();

        loop {
            let step = tokio::select! {
                biased;
                () = self.token.cancelled() => Step::Cancelled,
                frame = stream.next_frame() => Step::Frame(frame),
                () = tokio::time::sleep(check_period), if heartbeat_enabled => Step::HeartbeatCheck,
            };

            match step {
                Step::Cancelled => return SessionEnd::Cancelled,
                Step::Frame(Some(Ok(text))) => {
                    heartbeat.record_message();
                    if let Some(end) = self.handle_text(&text, stream, &mut heartbeat).await {
                        return end;
                    }
                }
                Step::Frame(Some(Err(e))) => return SessionEnd::Lost(e),
                Step::Frame(None) => {
                    return SessionEnd::Lost(WsError::ConnectionClosed {
                        code: 1006,
                        reason: "Stream ended".to_string(),
                    });
                }
                Step::HeartbeatCheck => {
                    if heartbeat.is_timed_out() {
                        error!("Heartbeat timeout");
                        return SessionEnd::Lost(WsError::HeartbeatTimeout);
                    }
                }
            }
        }
    }

    /// Handle one frame of a live session. Returns how the session ended
    /// when the frame ends it.
    async fn handle_text(
        &self,
        text: &str,
        stream: &mut dyn PushStream,
        heartbeat: &mut HeartbeatMonitor,
    ) -> Option<SessionEnd> {
        let packet = match socketio::decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "Dropping malformed push frame");
                return None;
            }
        };

        match packet {
            EnginePacket::Ping => {
                heartbeat.record_ping();
                if let Err(e) = stream.send_text(PONG_FRAME.to_string()).await {
                    return Some(SessionEnd::Lost(e));
                }
            }
            EnginePacket::Close => {
                return Some(SessionEnd::Lost(WsError::ConnectionClosed {
                    code: 1000,
                    reason: "Server closed the session".to_string(),
                }));
            }
            EnginePacket::Message(SocketPacket::Event { namespace, message })
                if namespace == DEFAULT_NAMESPACE =>
            {
                self.dispatch(message).await;
            }
            EnginePacket::Message(SocketPacket::Disconnect { namespace })
                if namespace == DEFAULT_NAMESPACE =>
            {
                return Some(SessionEnd::Lost(WsError::ConnectionClosed {
                    code: 1000,
                    reason: "Server disconnected the namespace".to_string(),
                }));
            }
            EnginePacket::Message(SocketPacket::ConnectError { message, .. }) => {
                return Some(SessionEnd::Lost(WsError::Handshake(message)));
            }
            other => debug!(packet = ?other, "Ignoring push packet"),
        }
        None
    }

    async fn dispatch(&self, msg: PushMessage) {
        match msg.kind() {
            PushEventKind::Connected => debug!(data = %msg.data, "Server greeted connection"),
            PushEventKind::Error => {
                let text = msg.error_text();
                warn!(error = %text, "Server reported error");
                self.emit(ChannelEvent::ChannelError(text)).await;
            }
            PushEventKind::StrategyUpdate => self.emit(ChannelEvent::Message(msg)).await,
            PushEventKind::Other => debug!(event = %msg.event, "Ignoring unknown push event"),
        }
    }

    /// Update shared state unless this run was cancelled. Returns false
    /// when cancelled.
    fn set_state(&self, state: ConnectionState) -> bool {
        // Holding the lock across the check orders this write before the
        // one made by `disconnect` after cancelling.
        let mut guard = self.state.write();
        if self.token.is_cancelled() {
            return false;
        }
        *guard = state;
        true
    }

    fn set_reconnect_count(&self, count: u32) {
        let mut guard = self.reconnect_count.write();
        if !self.token.is_cancelled() {
            *guard = count;
        }
    }

    async fn emit(&self, event: ChannelEvent) {
        if self.token.is_cancelled() {
            return;
        }
        if self.event_tx.send(event).await.is_err() {
            debug!("Channel event receiver dropped");
        }
    }
}

/// Run the client side of the Engine.IO open and namespace connect.
async fn handshake(stream: &mut dyn PushStream) -> Result<OpenInfo, WsError> {
    let mut open = None;
    loop {
        let text = match stream.next_frame().await {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(e),
            None => {
                return Err(WsError::ConnectionClosed {
                    code: 1006,
                    reason: "Stream ended during handshake".to_string(),
                })
            }
        };

        match socketio::decode(&text) {
            Ok(EnginePacket::Open(info)) => {
                debug!(
                    sid = %info.sid,
                    ping_interval_ms = info.ping_interval,
                    ping_timeout_ms = info.ping_timeout,
                    "Engine.IO session opened"
                );
                stream
                    .send_text(socketio::connect_frame(DEFAULT_NAMESPACE))
                    .await?;
                open = Some(info);
            }
            Ok(EnginePacket::Ping) => stream.send_text(PONG_FRAME.to_string()).await?,
            Ok(EnginePacket::Message(SocketPacket::Connect { namespace }))
                if namespace == DEFAULT_NAMESPACE =>
            {
                return open.ok_or_else(|| {
                    WsError::Handshake("namespace ack before open packet".to_string())
                });
            }
            Ok(EnginePacket::Message(SocketPacket::ConnectError { message, .. })) => {
                return Err(WsError::Handshake(message));
            }
            Ok(EnginePacket::Close) => {
                return Err(WsError::ConnectionClosed {
                    code: 1000,
                    reason: "Server closed during handshake".to_string(),
                })
            }
            Ok(other) => debug!(packet = ?other, "Ignoring packet during handshake"),
            Err(e) => warn!(error = %e, "Dropping malformed handshake frame"),
        }
    }
}

/// Leave the namespace, then close the websocket.
async fn close_session(stream: &mut dyn PushStream) {
    if let Err(e) = stream
        .send_text(socketio::disconnect_frame(DEFAULT_NAMESPACE))
        .await
    {
        debug!(error = %e, "Failed to send namespace disconnect");
    }
    stream.close().await;
}
