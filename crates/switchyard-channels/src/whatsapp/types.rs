//! WhatsApp bridge config and wire frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchyard_types::secret::SecretString;

pub const DEFAULT_BRIDGE_URL: &str = "ws://localhost:3001";

/// The `channels.whatsapp` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub bridge_url: String,
    /// Sent in an `auth` frame right after connecting, when set.
    pub bridge_token: SecretString,
    /// Phone numbers allowed to talk to the bot. Empty allows everyone.
    pub allow_from: Vec<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.into(),
            bridge_token: SecretString::default(),
            allow_from: Vec::new(),
        }
    }
}

/// An inbound chat message from the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeMessage {
    #[serde(default)]
    pub id: Option<String>,
    /// Sender JID, e.g. `"15551234567@s.whatsapp.net"`; replies go here.
    pub sender: String,
    /// Phone number of the sender, when the bridge knows it.
    #[serde(default)]
    pub pn: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub is_group: bool,
}

impl BridgeMessage {
    /// The user part of the sender: the phone number if known, else the
    /// JID up to `@`.
    pub fn sender_number(&self) -> &str {
        let source = self.pn.as_deref().filter(|p| !p.is_empty()).unwrap_or(&self.sender);
        source.split('@').next().unwrap_or(source)
    }
}

/// A frame received from the bridge.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Message(BridgeMessage),
    /// Connection state of the bridge's WhatsApp session.
    Status(String),
    /// A pairing QR code is waiting to be scanned.
    Qr,
    Error(String),
    /// Any frame type this client does not know.
    Other(String),
}

impl BridgeEvent {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let kind = str_field(&value, "type");

        Ok(match kind.as_str() {
            "message" => Self::Message(serde_json::from_value(value)?),
            "status" => Self::Status(str_field(&value, "status")),
            "qr" => Self::Qr,
            "error" => Self::Error(str_field(&value, "error")),
            _ => Self::Other(kind),
        })
    }
}

fn str_field(value: &Value, name: &str) -> String {
    value
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// A frame sent to the bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeCommand {
    Auth { token: String },
    Send { to: String, text: String },
}
