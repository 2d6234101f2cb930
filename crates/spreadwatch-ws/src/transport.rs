//! Transport seam for the push channel.
//!
//! `ConnectionManager` only talks to a `PushTransport`, which lets tests
//! drive it with `MockTransport` and a paused clock.
//!
//! Streams carry raw websocket text frames. Engine.IO and Socket.IO framing
//! is layered on top by the connection manager.

use crate::error::{WsError, WsResult};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

/// Boxed future type used by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opens push streams.
pub trait PushTransport: Send + Sync {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Box<dyn PushStream>>>;
}

/// One open push stream.
pub trait PushStream: Send {
    /// Next text frame. A close frame is returned as
    /// `WsError::ConnectionClosed`; `None` means the stream ended.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<WsResult<String>>>;

    fn send_text(&mut self, text: String) -> BoxFuture<'_, WsResult<()>>;

    /// Best-effort graceful close.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

pub type DynPushTransport = Arc<dyn PushTransport>;

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl PushTransport for WsTransport {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, WsResult<Box<dyn PushStream>>> {
        Box::pin(async move {
            // TCP_NODELAY: frames are small and latency matters more than batching
            let (stream, _response) = connect_async_tls_with_config(url, None, true, None)
                .await
                .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
            Ok(Box::new(WsStream { inner: stream }) as Box<dyn PushStream>)
        })
    }
}

struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushStream for WsStream {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<WsResult<String>>> {
        Box::pin(async move {
            loop {
                match self.inner.next().await? {
                    Ok(Message::Text(text)) => return Some(Ok(text)),
                    Ok(Message::Ping(data)) => {
                        debug!("Received ping, sending pong");
                        if let Err(e) = self.inner.send(Message::Pong(data)).await {
                            return Some(Err(e.into()));
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        return Some(Err(WsError::ConnectionClosed { code, reason }));
                    }
                    Ok(Message::Binary(_)) => {
                        debug!("Ignoring binary frame");
                    }
                    Ok(_) => {}
                    Err(e) => return Some(Err(e.into())),
                }
            }
        })
    }

    fn send_text(&mut self, text: String) -> BoxFuture<'_, WsResult<()>> {
        Box::pin(async move {
            self.inner
                .send(Message::Text(text))
                .await
                .map_err(|e| WsError::SendFailed(e.to_string()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.inner.close(None).await {
                warn!(?e, "Failed to send Close frame");
            }
        })
    }
}
