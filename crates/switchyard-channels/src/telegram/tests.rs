//! Channel-level tests for Telegram, against a mock Bot API server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchyard_types::error::ChannelError;
use switchyard_types::event::{InboundMessage, OutboundMessage};
use switchyard_types::secret::SecretString;

use crate::traits::{Channel, ChannelFactory, ChannelHost, ChannelStatus};

use super::channel::{TelegramChannel, TelegramChannelFactory};
use super::client::TelegramClient;
use super::types::Update;

// ── Helpers ──────────────────────────────────────────────────────────────

/// Collects delivered inbound messages.
struct MockHost {
    messages: tokio::sync::Mutex<Vec<InboundMessage>>,
}

impl MockHost {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: tokio::sync::Mutex::new(vec![]),
        })
    }
}

#[async_trait]
impl ChannelHost for MockHost {
    async fn deliver_inbound(&self, msg: InboundMessage) -> Result<(), ChannelError> {
        self.messages.lock().await.push(msg);
        Ok(())
    }
}

fn channel_for(server: &MockServer, allow_from: Vec<String>) -> TelegramChannel {
    let client = TelegramClient::new(&SecretString::new("tok"), Some(&server.uri()), None).unwrap();
    TelegramChannel::new(client, allow_from).with_timing(0, Duration::from_millis(20))
}

fn offline_channel(allow_from: &[&str]) -> TelegramChannel {
    let client = TelegramClient::new(&SecretString::new("tok"), None, None).unwrap();
    TelegramChannel::new(client, allow_from.iter().map(|s| s.to_string()).collect())
}

fn text_update(update_id: i64, user_id: i64, username: Option<&str>, text: &str) -> serde_json::Value {
    let mut from = json!({"id": user_id, "is_bot": false, "first_name": "Alice"});
    if let Some(name) = username {
        from["username"] = json!(name);
    }
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 42,
            "from": from,
            "chat": {"id": user_id, "type": "private"},
            "text": text,
            "date": 1700000000
        }
    })
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": result}))
}

async fn mount_get_me(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/bottok/getMe"))
        .respond_with(ok(json!({"id": 1, "is_bot": true, "first_name": "Bot", "username": "yard_bot"})))
        .mount(server)
        .await;
}

// ── Factory ──────────────────────────────────────────────────────────────

#[test]
fn factory_builds_with_token() {
    let channel = TelegramChannelFactory
        .build(&json!({"enabled": true, "token": "123:ABC", "allow_from": ["42"]}))
        .unwrap();
    assert_eq!(channel.name(), "telegram");
    assert_eq!(channel.status(), ChannelStatus::Stopped);
    assert!(!channel.is_running());
}

#[test]
fn factory_reads_token_from_env() {
    // PATH is always set and non-empty.
    assert!(
        TelegramChannelFactory
            .build(&json!({"token_env": "PATH"}))
            .is_ok()
    );
}

#[test]
fn factory_rejects_missing_token() {
    let err = TelegramChannelFactory.build(&json!({"enabled": true})).err().unwrap();
    assert!(matches!(err, ChannelError::InvalidConfig(_)));
    assert!(err.to_string().contains("token"));
}

#[test]
fn factory_rejects_wrong_shape() {
    let err = TelegramChannelFactory
        .build(&json!({"token": "t", "allow_from": "everyone"}))
        .err()
        .unwrap();
    assert!(err.is_construction_failure());
}

// ── Allow-list ───────────────────────────────────────────────────────────

#[test]
fn empty_allow_list_allows_everyone() {
    let ch = offline_channel(&[]);
    assert!(ch.is_allowed("123"));
    assert!(ch.is_allowed(""));
}

#[test]
fn allow_list_matches_id_or_username() {
    let ch = offline_channel(&["100", "bob"]);
    assert!(ch.is_allowed("100"));
    assert!(ch.is_allowed("100|alice"));
    assert!(ch.is_allowed("200|bob"));
    assert!(!ch.is_allowed("200|carol"));
    assert!(!ch.is_allowed(""));
}

// ── Inbound ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn process_update_delivers_text() {
    let ch = offline_channel(&[]);
    let host = MockHost::new();
    let host_dyn: Arc<dyn ChannelHost> = host.clone();

    let update: Update = serde_json::from_value(text_update(1, 999, Some("alice"), "hi")).unwrap();
    ch.process_update(&update, &host_dyn).await.unwrap();

    let messages = host.messages.lock().await;
    assert_eq!(messages.len(), 1);
    let msg = &messages[0];
    assert_eq!(msg.channel, "telegram");
    assert_eq!(msg.sender_id, "999|alice");
    assert_eq!(msg.chat_id, "999");
    assert_eq!(msg.content, "hi");
    assert_eq!(msg.timestamp.timestamp(), 1700000000);
    assert_eq!(msg.metadata["message_id"], "42");
    assert_eq!(msg.reply("ok").reply_to.as_deref(), Some("42"));
}

#[tokio::test]
async fn process_update_skips_disallowed_sender() {
    let ch = offline_channel(&["100"]);
    let host = MockHost::new();
    let host_dyn: Arc<dyn ChannelHost> = host.clone();

    let update: Update = serde_json::from_value(text_update(1, 999, None, "hi")).unwrap();
    ch.process_update(&update, &host_dyn).await.unwrap();
    assert!(host.messages.lock().await.is_empty());
}

#[tokio::test]
async fn process_update_skips_non_message_updates() {
    let ch = offline_channel(&[]);
    let host = MockHost::new();
    let host_dyn: Arc<dyn ChannelHost> = host.clone();

    let update: Update = serde_json::from_value(json!({"update_id": 5})).unwrap();
    ch.process_update(&update, &host_dyn).await.unwrap();
    assert!(host.messages.lock().await.is_empty());
}

// ── Lifecycle ────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_polls_until_stopped() {
    let server = MockServer::start().await;
    mount_get_me(&server).await;

    Mock::given(method("GET"))
        .and(path("/bottok/getUpdates"))
        .and(query_param("offset", "0"))
        .respond_with(ok(json!([text_update(7, 5, None, "first")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bottok/getUpdates"))
        .respond_with(ok(json!([])).set_delay(Duration::from_millis(20)))
        .mount(&server)
        .await;

    let channel = Arc::new(channel_for(&server, vec![]));
    let host = MockHost::new();
    let runner = {
        let channel = channel.clone();
        let host: Arc<dyn ChannelHost> = host.clone();
        tokio::spawn(async move { channel.start(host).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while host.messages.lock().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(channel.is_running());

    channel.stop().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), runner).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(channel.status(), ChannelStatus::Stopped);

    let messages = host.messages.lock().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "first");
}

#[tokio::test]
async fn start_fails_on_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bottok/getMe"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"})),
        )
        .mount(&server)
        .await;

    let channel = channel_for(&server, vec![]);
    let err = channel.start(MockHost::new()).await.unwrap_err();
    assert!(matches!(err, ChannelError::AuthFailed(ref d) if d == "Unauthorized"));
    assert!(matches!(channel.status(), ChannelStatus::Error(_)));
}

// ── Outbound ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_posts_message_with_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottok/sendMessage"))
        .and(body_partial_json(json!({"chat_id": 42, "text": "hello", "reply_to_message_id": 7})))
        .respond_with(ok(json!({"message_id": 99, "chat": {"id": 42, "type": "private"}, "date": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel_for(&server, vec![]);
    let mut msg = OutboundMessage::new("telegram", "42", "hello");
    msg.reply_to = Some("7".into());

    let id = channel.send(&msg).await.unwrap();
    assert_eq!(id.0, "99");
}

#[tokio::test]
async fn send_splits_long_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottok/sendMessage"))
        .respond_with(ok(json!({"message_id": 100, "chat": {"id": 42, "type": "private"}, "date": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let channel = channel_for(&server, vec![]);
    let long = "word ".repeat(1000);
    channel
        .send(&OutboundMessage::new("telegram", "42", long))
        .await
        .unwrap();
}

#[tokio::test]
async fn send_rejects_non_numeric_chat_id() {
    let ch = offline_channel(&[]);
    let err = ch
        .send(&OutboundMessage::new("telegram", "not-a-number", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::SendFailed(_)), "got: {err:?}");
}

#[tokio::test]
async fn send_surfaces_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottok/sendMessage"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"ok": false, "description": "Bad Request: chat not found"})),
        )
        .mount(&server)
        .await;

    let channel = channel_for(&server, vec![]);
    let err = channel
        .send(&OutboundMessage::new("telegram", "1", "hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("chat not found"));
}
