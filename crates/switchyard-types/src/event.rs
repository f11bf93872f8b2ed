//! Message envelopes carried by the bus.
//!
//! [`InboundMessage`] is produced by a channel when a user writes to the
//! bot; [`OutboundMessage`] is produced by the processing core and routed
//! back to the channel named in its `channel` field. Both are plain data:
//! once a message is enqueued nobody mutates it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message received from a chat platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Name of the channel that received the message (e.g. `"telegram"`).
    pub channel: String,

    /// Platform identifier of the sender.
    pub sender_id: String,

    /// Conversation identifier; replies are addressed to it.
    pub chat_id: String,

    /// Message text.
    pub content: String,

    /// When the message was received.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// URLs or platform identifiers of attachments.
    #[serde(default)]
    pub media: Vec<String>,

    /// Channel-specific extras (message id, username, chat type...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    /// Build a text message stamped with the current time.
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Stable session key: `"{channel}:{chat_id}"`.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Build a text reply addressed to the same channel and chat.
    pub fn reply(&self, content: impl Into<String>) -> OutboundMessage {
        let mut reply = OutboundMessage::new(&self.channel, &self.chat_id, content);
        if let Some(id) = self.metadata.get("message_id") {
            reply.reply_to = Some(match id {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        reply
    }
}

/// A message to deliver to a chat platform.
///
/// `channel` must name a channel registered with the
/// `ChannelManager`; messages for unknown channels are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel name.
    pub channel: String,

    /// Target conversation identifier.
    pub chat_id: String,

    /// Message text.
    pub content: String,

    /// Platform message id this message answers, if any.
    #[serde(default)]
    pub reply_to: Option<String>,

    /// URLs or platform identifiers of attachments.
    #[serde(default)]
    pub media: Vec<String>,

    /// Correlation data and channel-specific extras.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OutboundMessage {
    /// Build a plain text message.
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_session_key() {
        let msg = InboundMessage::new("telegram", "user123", "chat456", "hello");
        assert_eq!(msg.session_key(), "telegram:chat456");
    }

    #[test]
    fn inbound_defaults_on_missing_fields() {
        let json = r#"{
            "channel": "discord",
            "sender_id": "u1",
            "chat_id": "c1",
            "content": "hi"
        }"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        assert!(msg.media.is_empty());
        assert!(msg.metadata.is_empty());
    }

    #[test]
    fn reply_targets_origin_chat() {
        let mut msg = InboundMessage::new("discord", "u1", "c42", "ping");
        msg.metadata
            .insert("message_id".into(), serde_json::json!("9001"));

        let reply = msg.reply("pong");
        assert_eq!(reply.channel, "discord");
        assert_eq!(reply.chat_id, "c42");
        assert_eq!(reply.content, "pong");
        assert_eq!(reply.reply_to.as_deref(), Some("9001"));
    }

    #[test]
    fn reply_stringifies_numeric_message_id() {
        let mut msg = InboundMessage::new("telegram", "u1", "7", "ping");
        msg.metadata.insert("message_id".into(), serde_json::json!(55));
        assert_eq!(msg.reply("pong").reply_to.as_deref(), Some("55"));
    }

    #[test]
    fn outbound_optional_fields_default() {
        let json = r#"{"channel": "telegram", "chat_id": "1", "content": "x"}"#;
        let msg: OutboundMessage = serde_json::from_str(json).unwrap();
        assert!(msg.reply_to.is_none());
        assert!(msg.media.is_empty());
        assert!(msg.metadata.is_empty());
    }
}
