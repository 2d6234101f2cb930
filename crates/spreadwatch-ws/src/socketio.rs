//! Engine.IO v4 / Socket.IO v5 packet framing.
//!
//! Only the websocket transport is spoken, so every text frame carries
//! exactly one Engine.IO packet. The first character is the Engine.IO
//! packet type; a `4` (message) wraps a Socket.IO packet whose first
//! character is the Socket.IO packet type:
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                     ping / pong
//! 40  40{"sid":".."}                                        namespace connect / ack
//! 41                                                        namespace disconnect
//! 42["strategy_update",{...}]                               event
//! 44{"message":".."}                                        connect error
//! ```
//!
//! Binary attachments and acknowledgements are recognised but not used.

use crate::error::{WsError, WsResult};
use crate::message::PushMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO pong, sent in reply to every server ping.
pub const PONG_FRAME: &str = "3";

/// Engine.IO ping, sent by the server.
pub const PING_FRAME: &str = "2";

const ENGINE_IO_QUERY: &str = "EIO=4&transport=websocket";

/// Session parameters announced in the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    /// Milliseconds between server pings.
    #[serde(default)]
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong; also the client's grace period.
    #[serde(default)]
    pub ping_timeout: u64,
}

/// One decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// One decoded Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    Event { namespace: String, message: PushMessage },
    ConnectError { namespace: String, message: String },
    /// Acks and binary packets.
    Unsupported { namespace: String, kind: char },
}

/// Decode one websocket text frame.
pub fn decode(frame: &str) -> WsResult<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| WsError::ParseError("empty frame".to_string()))?;
    let rest = chars.as_str();

    match kind {
        '0' => Ok(EnginePacket::Open(serde_json::from_str(rest)?)),
        '1' => Ok(EnginePacket::Close),
        // Ping payloads only appear during transport upgrades
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(WsError::ParseError(format!(
            "unknown engine.io packet type {other:?}"
        ))),
    }
}

fn decode_socket(packet: &str) -> WsResult<SocketPacket> {
    let mut chars = packet.chars();
    let kind = chars
        .next()
        .ok_or_else(|| WsError::ParseError("empty socket.io packet".to_string()))?;
    let (namespace, body) = split_namespace(chars.as_str());
    // Ack ids sit between the namespace and the payload
    let payload = body.trim_start_matches(|c: char| c.is_ascii_digit());

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let message = decode_event(payload)?;
            Ok(SocketPacket::Event { namespace, message })
        }
        '4' => Ok(SocketPacket::ConnectError {
            namespace,
            message: connect_error_text(payload),
        }),
        '3' | '5' | '6' => Ok(SocketPacket::Unsupported { namespace, kind }),
        other => Err(WsError::ParseError(format!(
            "unknown socket.io packet type {other:?}"
        ))),
    }
}

fn split_namespace(body: &str) -> (String, &str) {
    if !body.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), body);
    }
    match body.split_once(',') {
        Some((namespace, rest)) => (namespace.to_string(), rest),
        None => (body.to_string(), ""),
    }
}

fn decode_event(payload: &str) -> WsResult<PushMessage> {
    let args: Vec<Value> = serde_json::from_str(payload)?;
    let mut args = args.into_iter();
    let event = match args.next() {
        Some(Value::String(name)) => name,
        Some(other) => {
            return Err(WsError::ParseError(format!(
                "event name must be a string, got {other}"
            )))
        }
        None => return Err(WsError::ParseError("event without a name".to_string())),
    };
    Ok(PushMessage::new(event, args.next().unwrap_or(Value::Null)))
}

fn connect_error_text(payload: &str) -> String {
    if payload.is_empty() {
        return "connect error".to_string();
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(data) => PushMessage::new("connect_error", data).error_text(),
        Err(_) => payload.to_string(),
    }
}

/// Client request to join `namespace`.
pub fn connect_frame(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        "40".to_string()
    } else {
        format!("40{namespace},")
    }
}

/// Client notice that it is leaving `namespace`.
pub fn disconnect_frame(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        "41".to_string()
    } else {
        format!("41{namespace},")
    }
}

/// Event packet on the default namespace.
pub fn event_frame(event: &str, data: &Value) -> WsResult<String> {
    Ok(format!("42{}", serde_json::to_string(&(event, data))?))
}

/// Server open packet.
pub fn open_frame(info: &OpenInfo) -> WsResult<String> {
    Ok(format!("0{}", serde_json::to_string(info)?))
}

/// Server acknowledgement of a default-namespace connect.
pub fn connect_ack_frame(sid: &str) -> WsResult<String> {
    Ok(format!("40{}", serde_json::json!({ "sid": sid })))
}

/// Websocket endpoint for a Socket.IO server URL.
///
/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`
/// (`https` maps to `wss`, other schemes are kept). URLs already pointing at
/// `/socket.io` are only rewritten in scheme.
pub fn endpoint_url(base: &str) -> String {
    let Some((scheme, rest)) = base.split_once("://") else {
        return base.to_string();
    };
    let scheme = match scheme {
        "http" => "ws",
        "https" => "wss",
        other => other,
    };
    if rest.contains("/socket.io") {
        return format!("{scheme}://{rest}");
    }
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], rest[i..].trim_end_matches('/')),
        None => (rest, ""),
    };
    format!("{scheme}://{authority}{path}/socket.io/?{ENGINE_IO_QUERY}")
}
