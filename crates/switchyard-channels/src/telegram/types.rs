//! Telegram Bot API types.
//!
//! Only the fields the channel reads are modelled; everything else in
//! the API responses is ignored.

use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response: `{ ok, result?, description? }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    /// Error text, present when `ok` is `false`.
    pub description: Option<String>,
}

/// One entry from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonically increasing; the next poll uses `update_id + 1`.
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Absent for channel posts.
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    /// Text attached to photos, documents and other media.
    pub caption: Option<String>,
    /// Unix timestamp.
    pub date: i64,
}

impl Message {
    /// The message text, falling back to the media caption.
    pub fn body(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    /// Without the leading `@`.
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `"private"`, `"group"`, `"supergroup"` or `"channel"`.
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

/// Body of `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_error_response() {
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let resp: TelegramResponse<User> = serde_json::from_str(json).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn deserialize_update_with_message() {
        let json = r#"{
            "update_id": 100,
            "message": {
                "message_id": 42,
                "from": {"id": 999, "is_bot": false, "first_name": "Alice", "username": "alice"},
                "chat": {"id": -1001234, "type": "group", "title": "Test Group"},
                "text": "Hello, bot!",
                "date": 1700000000
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.message_id, 42);
        assert_eq!(msg.body(), Some("Hello, bot!"));
        assert_eq!(msg.from.unwrap().username.as_deref(), Some("alice"));
        assert_eq!(msg.chat.chat_type, "group");
    }

    #[test]
    fn body_falls_back_to_caption() {
        let json = r#"{
            "message_id": 7,
            "chat": {"id": 1, "type": "private"},
            "caption": "look at this",
            "date": 1700000002
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.body(), Some("look at this"));
    }

    #[test]
    fn body_absent_for_media_without_caption() {
        let json = r#"{"message_id": 8, "chat": {"id": 1, "type": "private"}, "date": 1}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.body().is_none());
    }

    #[test]
    fn send_request_omits_missing_reply() {
        let req = SendMessageRequest {
            chat_id: 42,
            text: "Hello!".into(),
            reply_to_message_id: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["chat_id"], 42);
        assert!(json.get("reply_to_message_id").is_none());
    }
}
