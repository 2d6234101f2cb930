//! Mock Socket.IO server for integration tests.
//!
//! Accepts websocket connections, runs the Engine.IO open and namespace
//! handshake, greets each client with a `connected` event, pings at the
//! announced interval, records received frames, and fans out events pushed
//! by the test to every open connection.

use futures_util::{SinkExt, StreamExt};
use spreadwatch_ws::socketio::{self, OpenInfo};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// A mock Socket.IO server for testing.
pub struct MockPushServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    push_tx: broadcast::Sender<String>,
    messages: Arc<Mutex<Vec<String>>>,
    paths: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockPushServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        Self::start_with_ping_interval(25_000).await
    }

    /// Start a server that pings every `ping_interval_ms`.
    pub async fn start_with_ping_interval(ping_interval_ms: u64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let paths = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (push_tx, _) = broadcast::channel(64);

        let messages_clone = messages.clone();
        let paths_clone = paths.clone();
        let connections_clone = connections.clone();
        let push_clone = push_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            ping_interval_ms,
                            messages_clone.clone(),
                            paths_clone.clone(),
                            connections_clone.clone(),
                            push_clone.subscribe(),
                        ));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            push_tx,
            messages,
            paths,
            connections,
        }
    }

    /// Base URL, as a Socket.IO client would be configured.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    /// Request paths of accepted websocket upgrades.
    pub async fn request_paths(&self) -> Vec<String> {
        self.paths.lock().await.clone()
    }

    /// Wait until a client sent `frame`.
    pub async fn wait_for_message(&self, frame: &str) -> bool {
        let found = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if self.received_messages().await.iter().any(|m| m == frame) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        found.is_ok()
    }

    /// Push an event to every open connection.
    pub fn push_event(&self, event: &str, data: serde_json::Value) {
        let frame = socketio::event_frame(event, &data).unwrap();
        let _ = self.push_tx.send(frame);
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    ping_interval_ms: u64,
    messages: Arc<Mutex<Vec<String>>>,
    paths: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
    mut push_rx: broadcast::Receiver<String>,
) {
    {
        let mut count = connections.lock().await;
        *count += 1;
    }

    let mut path = String::new();
    let accepted = accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        path = req.uri().to_string();
        Ok(resp)
    })
    .await;
    let ws_stream = match accepted {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    paths.lock().await.push(path);
    let (mut write, mut read) = ws_stream.split();

    let open = OpenInfo {
        sid: "mock-server-sid".to_string(),
        ping_interval: ping_interval_ms,
        ping_timeout: 20_000,
    };
    let open = socketio::open_frame(&open).unwrap();
    if write.send(Message::Text(open)).await.is_err() {
        return;
    }

    let mut ping = tokio::time::interval(Duration::from_millis(ping_interval_ms));
    ping.tick().await;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    messages.lock().await.push(text.clone());
                    if text == socketio::connect_frame(socketio::DEFAULT_NAMESPACE) {
                        let ack = socketio::connect_ack_frame("mock-namespace-sid").unwrap();
                        let hello = socketio::event_frame(
                            "connected",
                            &serde_json::json!({"data": "Connected to server"}),
                        )
                        .unwrap();
                        if write.send(Message::Text(ack)).await.is_err()
                            || write.send(Message::Text(hello)).await.is_err()
                        {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
            _ = ping.tick() => {
                if write.send(Message::Text(socketio::PING_FRAME.to_string())).await.is_err() {
                    break;
                }
            }
            frame = push_rx.recv() => match frame {
                Ok(frame) => {
                    if write.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
