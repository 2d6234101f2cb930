//! Mock push transport for testing.
//!
//! Each accepted `open` hands the test a `MockPeer` that plays the server
//! side of the stream: it can push frames, close, or drop the connection,
//! and it records every frame the client sent.
//!
//! By default the transport queues a Socket.IO open packet and namespace
//! ack on every accepted stream, so the client connects without the test
//! scripting the handshake. `without_handshake` leaves that to the peer.

use crate::error::{WsError, WsResult};
use crate::socketio::{self, OpenInfo};
use crate::transport::{BoxFuture, PushStream, PushTransport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Outcome of one `open` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenPlan {
    Accept,
    Refuse(String),
}

#[derive(Debug)]
enum MockFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Server side of one mock connection.
#[derive(Debug)]
pub struct MockPeer {
    frames: mpsc::UnboundedSender<MockFrame>,
    sent: Arc<Mutex<Vec<String>>>,
    client_closed: Arc<AtomicBool>,
}

impl MockPeer {
    /// Push a raw text frame to the client.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.frames.send(MockFrame::Text(text.into()));
    }

    /// Push a `42["event",data]` Socket.IO event to the client.
    pub fn send_event(&self, event: &str, data: serde_json::Value) {
        if let Ok(text) = socketio::event_frame(event, &data) {
            self.send_text(text);
        }
    }

    /// Send an Engine.IO ping.
    pub fn send_ping(&self) {
        self.send_text(socketio::PING_FRAME);
    }

    /// Send a close frame.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.frames.send(MockFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// End the stream without a close frame.
    pub fn drop_connection(self) {}

    /// Frames the client sent on this connection.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Whether the client closed this connection.
    pub fn client_closed(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

/// Scripted transport for testing.
#[derive(Debug)]
pub struct MockTransport {
    plan: Mutex<VecDeque<OpenPlan>>,
    fallback: Mutex<OpenPlan>,
    attempts: Mutex<Vec<Instant>>,
    urls: Mutex<Vec<String>>,
    handshake: bool,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a transport that accepts every connection.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Like `new`, but each peer must send the open packet and namespace
    /// ack itself.
    pub fn without_handshake() -> Self {
        Self::build(false)
    }

    fn build(handshake: bool) -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            plan: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(OpenPlan::Accept),
            attempts: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            handshake,
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        }
    }

    /// Queue the outcome of the next `open`.
    pub fn push_plan(&self, plan: OpenPlan) {
        self.plan.lock().push_back(plan);
    }

    /// Outcome used once the queued plan is exhausted.
    pub fn set_fallback(&self, plan: OpenPlan) {
        *self.fallback.lock() = plan;
    }

    /// Times of every `open` call.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    /// URLs passed to every `open` call.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Wait for the next accepted connection.
    pub async fn next_peer(&self) -> Option<MockPeer> {
        self.peers_rx.lock().await.recv().await
    }
}

impl PushTransport for MockTransport {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Box<dyn PushStream>>> {
        Box::pin(async move {
            self.attempts.lock().push(Instant::now());
            self.urls.lock().push(url.to_string());
            let plan = self
                .plan
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.fallback.lock().clone());

            match plan {
                OpenPlan::Refuse(reason) => Err(WsError::ConnectionFailed(reason)),
                OpenPlan::Accept => {
                    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
                    if self.handshake {
                        for frame in handshake_frames()? {
                            let _ = frames_tx.send(MockFrame::Text(frame));
                        }
                    }
                    let sent = Arc::new(Mutex::new(Vec::new()));
                    let client_closed = Arc::new(AtomicBool::new(false));
                    let _ = self.peers_tx.send(MockPeer {
                        frames: frames_tx,
                        sent: sent.clone(),
                        client_closed: client_closed.clone(),
                    });
                    Ok(Box::new(MockStream {
                        frames: frames_rx,
                        sent,
                        client_closed,
                    }) as Box<dyn PushStream>)
                }
            }
        })
    }
}

fn handshake_frames() -> WsResult<[String; 2]> {
    let info = OpenInfo {
        sid: "mock-sid".to_string(),
        ping_interval: 25_000,
        ping_timeout: 20_000,
    };
    Ok([
        socketio::open_frame(&info)?,
        socketio::connect_ack_frame("mock-namespace-sid")?,
    ])
}

struct MockStream {
    frames: mpsc::UnboundedReceiver<MockFrame>,
    sent: Arc<Mutex<Vec<String>>>,
    client_closed: Arc<AtomicBool>,
}

impl PushStream for MockStream {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<WsResult<String>>> {
        Box::pin(async move {
            match self.frames.recv().await? {
                MockFrame::Text(text) => Some(Ok(text)),
                MockFrame::Close { code, reason } => {
                    Some(Err(WsError::ConnectionClosed { code, reason }))
                }
            }
        })
    }

    fn send_text(&mut self, text: String) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.sent.lock().push(text);
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.client_closed.store(true, Ordering::SeqCst);
        })
    }
}
