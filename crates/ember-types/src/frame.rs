/// Text packet codec for the Engine.IO v4 / Socket.IO v5 websocket transport.
///
/// ```text
/// 0{"sid":..,"pingInterval":..}   engine open handshake
/// 1                               engine close
/// 2 / 3                           engine ping / pong
/// 6                               engine noop
/// 40{"sid":".."}                  socket connect (default namespace)
/// 41                              socket disconnect
/// 42["event-name",payload]        socket event
/// 44{"message":".."}              socket connect error
/// ```
///
/// Namespaced packets (`42/chat,["x"]`) and ack ids (`4217["x"]`) are
/// accepted on decode; everything this client emits uses the default
/// namespace without acks.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty packet")]
    Empty,

    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),

    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),

    #[error("malformed packet payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("event packet is not a non-empty [name, ...] array")]
    MalformedEvent,
}

/// Engine handshake sent by the server right after the websocket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenHandshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// Socket connected; carries the socket id assigned by the server.
    Connect { sid: Option<String> },
    Disconnect,
    ConnectError(String),
    Event { name: String, data: Value },
}

impl Packet {
    /// Build the connect packet for the default namespace.
    pub fn connect() -> Self {
        Packet::Connect { sid: None }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            Packet::Close => "1".to_string(),
            Packet::Ping => "2".to_string(),
            Packet::Pong => "3".to_string(),
            Packet::Noop => "6".to_string(),
            Packet::Connect { sid: None } => "40".to_string(),
            Packet::Connect { sid: Some(sid) } => {
                format!("40{}", serde_json::json!({ "sid": sid }))
            }
            Packet::Disconnect => "41".to_string(),
            Packet::ConnectError(message) => {
                format!("44{}", serde_json::json!({ "message": message }))
            }
            Packet::Event { name, data } => {
                format!("42{}", Value::Array(vec![Value::String(name.clone()), data.clone()]))
            }
        }
    }

    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let mut chars = text.chars();
        let engine_type = chars.next().ok_or(FrameError::Empty)?;
        let rest = chars.as_str();

        match engine_type {
            '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => decode_socket_packet(rest),
            '6' => Ok(Packet::Noop),
            other => Err(FrameError::UnknownEngineType(other)),
        }
    }
}

fn decode_socket_packet(text: &str) -> Result<Packet, FrameError> {
    let mut chars = text.chars();
    let socket_type = chars.next().ok_or(FrameError::Empty)?;
    let body = strip_ack_id(strip_namespace(chars.as_str()));

    match socket_type {
        '0' => {
            let sid = if body.is_empty() {
                None
            } else {
                let value: Value = serde_json::from_str(body)?;
                value.get("sid").and_then(Value::as_str).map(str::to_string)
            };
            Ok(Packet::Connect { sid })
        }
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let value: Value = serde_json::from_str(body)?;
            let Value::Array(mut items) = value else {
                return Err(FrameError::MalformedEvent);
            };
            if items.is_empty() {
                return Err(FrameError::MalformedEvent);
            }
            let Value::String(name) = items.remove(0) else {
                return Err(FrameError::MalformedEvent);
            };
            let data = if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            };
            Ok(Packet::Event { name, data })
        }
        '4' => {
            let value: Value = serde_json::from_str(body)?;
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            Ok(Packet::ConnectError(message))
        }
        other => Err(FrameError::UnknownSocketType(other)),
    }
}

/// `/chat,["x"]` -> `["x"]`
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

/// `17["x"]` -> `["x"]`
fn strip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}
