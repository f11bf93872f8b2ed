//! Discord Gateway v10 payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event was dispatched (`t` names it).
pub const OP_DISPATCH: u8 = 0;
/// Heartbeat, in either direction.
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
/// The server is going away; reconnect.
pub const OP_RECONNECT: u8 = 7;
pub const OP_INVALID_SESSION: u8 = 9;
/// First frame after connecting; carries the heartbeat interval.
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

/// Close codes after which reconnecting cannot help (bad token,
/// sharding or intents).
pub const FATAL_CLOSE_CODES: &[u16] = &[4004, 4010, 4011, 4012, 4013, 4014];

/// The Gateway envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    pub d: Option<Value>,
    /// Sequence number; only on dispatches.
    pub s: Option<u64>,
    /// Event name; only on dispatches.
    pub t: Option<String>,
}

impl GatewayPayload {
    /// A client-to-server payload.
    pub fn new(op: u8, d: Option<Value>) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// A heartbeat carrying the last seen sequence number.
    pub fn heartbeat(seq: Option<u64>) -> Self {
        Self::new(OP_HEARTBEAT, seq.map(Value::from))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelloData {
    /// Milliseconds between heartbeats.
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u32,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// `MESSAGE_CREATE` dispatch data.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: User,
    /// Absent for direct messages.
    pub guild_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub url: String,
}

/// `READY` dispatch data.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    pub user: User,
    pub session_id: String,
}

/// Body of a REST 429 response.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimited {
    /// Seconds to wait before retrying.
    pub retry_after: f64,
}
