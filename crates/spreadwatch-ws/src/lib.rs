//! Push channel client for the spreadwatch strategy console.
//!
//! Provides the connection to the strategy server's Socket.IO event stream with:
//! - Engine.IO v4 / Socket.IO framing over a websocket
//! - Automatic reconnection at a fixed delay with a bounded attempt budget
//! - Liveness monitoring driven by the server's Engine.IO pings
//! - Channel-based delivery of lifecycle and message events
//! - A pluggable transport (`WsTransport` for production, `MockTransport` for tests)

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;
pub mod mock;
pub mod socketio;
pub mod transport;

pub use connection::{ChannelEvent, ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};
pub use message::{PushEventKind, PushMessage};
pub use mock::{MockPeer, MockTransport, OpenPlan};
pub use transport::{BoxFuture, DynPushTransport, PushStream, PushTransport, WsTransport};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
