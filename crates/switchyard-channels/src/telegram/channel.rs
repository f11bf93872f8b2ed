//! [`TelegramChannel`] -- long-polling `Channel` implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use switchyard_types::error::ChannelError;
use switchyard_types::event::{InboundMessage, OutboundMessage};
use switchyard_types::secret::SecretString;

use crate::chunk::chunk_message;
use crate::state::ChannelState;
use crate::traits::{Channel, ChannelFactory, ChannelHost, ChannelStatus, MessageId};

use super::client::TelegramClient;
use super::types::Update;

/// Server-side long-poll timeout for `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Delay before polling again after a failed `getUpdates`.
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram's limit on message text, in characters.
const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// The `channels.telegram` config section.
///
/// ```json
/// {
///   "enabled": true,
///   "token": "123456:ABC-DEF",
///   "allow_from": ["12345", "alice"],
///   "proxy": "socks5://127.0.0.1:1080"
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: SecretString,
    /// Environment variable to read the token from when `token` is empty.
    pub token_env: Option<String>,
    /// User ids or usernames allowed to talk to the bot. Empty allows
    /// everyone.
    pub allow_from: Vec<String>,
    /// HTTP(S) or SOCKS proxy for all API calls.
    pub proxy: Option<String>,
    /// Bot API server, for self-hosted deployments.
    pub api_base: Option<String>,
}

/// Telegram bot connected via `getUpdates` long polling.
///
/// Inbound text (or media captions) is forwarded to the host with
/// `sender_id` set to `"{user_id}|{username}"` when the sender has a
/// username. Outbound messages are sent with `sendMessage`, split at
/// Telegram's length limit.
pub struct TelegramChannel {
    client: TelegramClient,
    state: ChannelState,
    /// Next `getUpdates` offset (last seen update_id + 1).
    offset: AtomicI64,
    allow_from: Vec<String>,
    poll_timeout_secs: u64,
    retry_delay: Duration,
}

impl TelegramChannel {
    pub fn new(client: TelegramClient, allow_from: Vec<String>) -> Self {
        Self {
            client,
            state: ChannelState::new(),
            offset: AtomicI64::new(0),
            allow_from,
            poll_timeout_secs: POLL_TIMEOUT_SECS,
            retry_delay: ERROR_RETRY_DELAY,
        }
    }

    /// Override the long-poll and retry timing.
    pub fn with_timing(mut self, poll_timeout_secs: u64, retry_delay: Duration) -> Self {
        self.poll_timeout_secs = poll_timeout_secs;
        self.retry_delay = retry_delay;
        self
    }

    /// Whether `sender_id` may talk to the bot.
    ///
    /// Composite ids (`"123|alice"`) match when the whole id or either
    /// part is listed.
    pub fn is_allowed(&self, sender_id: &str) -> bool {
        if self.allow_from.is_empty() {
            return true;
        }
        if self.allow_from.iter().any(|a| a == sender_id) {
            return true;
        }
        sender_id
            .split('|')
            .filter(|part| !part.is_empty())
            .any(|part| self.allow_from.iter().any(|a| a == part))
    }

    /// Forward one update to `host` if it carries an allowed text message.
    pub(crate) async fn process_update(
        &self,
        update: &Update,
        host: &Arc<dyn ChannelHost>,
    ) -> Result<(), ChannelError> {
        let Some(ref msg) = update.message else {
            debug!(update_id = update.update_id, "skipping non-message update");
            return Ok(());
        };
        let Some(body) = msg.body() else {
            debug!(update_id = update.update_id, "skipping message without text");
            return Ok(());
        };

        let sender_id = match &msg.from {
            Some(user) => match &user.username {
                Some(username) => format!("{}|{username}", user.id),
                None => user.id.to_string(),
            },
            None => String::new(),
        };

        if !self.is_allowed(&sender_id) {
            warn!(
                sender_id = %sender_id,
                chat_id = msg.chat.id,
                "message from disallowed user, ignoring"
            );
            return Ok(());
        }

        let mut metadata = HashMap::new();
        metadata.insert("message_id".into(), msg.message_id.to_string().into());
        metadata.insert("chat_type".into(), msg.chat.chat_type.clone().into());
        if let Some(ref from) = msg.from {
            metadata.insert("user_id".into(), from.id.into());
            metadata.insert("first_name".into(), from.first_name.clone().into());
            if let Some(ref username) = from.username {
                metadata.insert("username".into(), username.clone().into());
            }
        }

        let mut inbound = InboundMessage::new("telegram", sender_id, msg.chat.id.to_string(), body);
        inbound.timestamp = DateTime::<Utc>::from_timestamp(msg.date, 0).unwrap_or_else(Utc::now);
        inbound.metadata = metadata;

        host.deliver_inbound(inbound).await
    }

    /// Poll until cancelled. Failed polls are retried after a delay.
    async fn poll_loop(&self, host: &Arc<dyn ChannelHost>, cancel: &CancellationToken) {
        loop {
            let offset = self.offset.load(Ordering::SeqCst);
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.client.get_updates(offset, self.poll_timeout_secs) => result,
            };

            match result {
                Ok(updates) => {
                    for update in &updates {
                        if let Err(e) = self.process_update(update, host).await {
                            error!(update_id = update.update_id, error = %e, "failed to process update");
                        }
                        self.offset.store(update.update_id + 1, Ordering::SeqCst);
                    }
                }
                Err(e) => {
                    error!(error = %e, "getUpdates failed");
                    self.state.set(ChannelStatus::Error(e.to_string())).await;
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                    self.state.set(ChannelStatus::Running).await;
                }
            }
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn status(&self) -> ChannelStatus {
        self.state.status()
    }

    async fn start(&self, host: Arc<dyn ChannelHost>) -> Result<(), ChannelError> {
        let cancel = self.state.begin().await;

        let me = tokio::select! {
            _ = cancel.cancelled() => {
                self.state.finish().await;
                return Ok(());
            }
            me = self.client.get_me() => me,
        };
        let me = match me {
            Ok(me) => me,
            Err(e) => {
                error!(error = %e, "failed to verify Telegram bot token");
                self.state.set(ChannelStatus::Error(e.to_string())).await;
                return Err(e);
            }
        };

        info!(
            bot_id = me.id,
            bot_name = %me.username.as_deref().unwrap_or(&me.first_name),
            "Telegram bot authenticated"
        );
        self.state.set(ChannelStatus::Running).await;

        self.poll_loop(&host, &cancel).await;

        self.state.finish().await;
        info!("Telegram channel stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.state.request_stop().await;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, ChannelError> {
        let chat_id: i64 = msg.chat_id.parse().map_err(|_| {
            ChannelError::SendFailed(format!("invalid chat_id '{}': expected i64", msg.chat_id))
        })?;

        let reply_to: Option<i64> = msg
            .reply_to
            .as_ref()
            .map(|id| {
                id.parse::<i64>().map_err(|_| {
                    ChannelError::SendFailed(format!("invalid reply_to '{id}': expected i64"))
                })
            })
            .transpose()?;

        let mut last_id = None;
        for (i, chunk) in chunk_message(&msg.content, TELEGRAM_MAX_MESSAGE_LEN)
            .into_iter()
            .enumerate()
        {
            let reply = if i == 0 { reply_to } else { None };
            let sent = self.client.send_message(chat_id, chunk, reply).await?;
            last_id = Some(sent.message_id);
        }

        last_id
            .map(|id| MessageId(id.to_string()))
            .ok_or_else(|| ChannelError::SendFailed("nothing was sent".into()))
    }
}

/// Builds [`TelegramChannel`]s from a [`TelegramConfig`] section.
pub struct TelegramChannelFactory;

impl ChannelFactory for TelegramChannelFactory {
    fn channel_name(&self) -> &str {
        "telegram"
    }

    fn build(&self, config: &serde_json::Value) -> Result<Arc<dyn Channel>, ChannelError> {
        let config: TelegramConfig = serde_json::from_value(config.clone())
            .map_err(|e| ChannelError::InvalidConfig(format!("telegram: {e}")))?;

        let token = config.token.or_env(config.token_env.as_deref());
        if token.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "missing 'token' in telegram config".into(),
            ));
        }

        let client = TelegramClient::new(
            &token,
            config.api_base.as_deref(),
            config.proxy.as_deref().filter(|p| !p.is_empty()),
        )?;
        Ok(Arc::new(TelegramChannel::new(client, config.allow_from)))
    }
}
