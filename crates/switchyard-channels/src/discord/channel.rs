//! [`DiscordChannel`] -- Gateway session loop and REST sends.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use switchyard_types::error::ChannelError;
use switchyard_types::event::{InboundMessage, OutboundMessage};

use crate::chunk::chunk_message;
use crate::state::ChannelState;
use crate::traits::{Channel, ChannelHost, ChannelStatus, MessageId};

use super::api::DiscordApiClient;
use super::events::{
    ConnectionProperties, FATAL_CLOSE_CODES, GatewayPayload, HelloData, IdentifyPayload,
    MessageCreate, OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO, OP_IDENTIFY,
    OP_INVALID_SESSION, OP_RECONNECT, ReadyEvent,
};
use super::factory::DiscordConfig;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Discord's limit on message content, in characters.
const DISCORD_MAX_MESSAGE_LEN: usize = 2000;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, WsMessage>;
type WsRead = SplitStream<WsStream>;

/// How a Gateway session ended.
enum SessionEnd {
    /// `stop` was requested.
    Stopped,
    /// The connection dropped or the server asked us to reconnect.
    Reconnect(String),
    /// Reconnecting cannot help (e.g. the token was rejected).
    Fatal(ChannelError),
}

/// What the session loop should do after one Gateway payload.
enum Flow {
    Continue,
    /// The server asked for an immediate heartbeat.
    Heartbeat,
    Reconnect(String),
}

/// Discord bot connected via the Gateway.
///
/// Bot authors are ignored to avoid reply loops. Each Gateway session
/// starts with a fresh Identify; dropped connections are retried after
/// a delay until `stop` is called.
pub struct DiscordChannel {
    api: DiscordApiClient,
    config: DiscordConfig,
    state: ChannelState,
    /// Last dispatch sequence number; 0 when none was seen.
    sequence: AtomicU64,
    reconnect_delay: Duration,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        let api = DiscordApiClient::new(config.token.clone(), config.api_base.as_deref());
        Self {
            api,
            config,
            state: ChannelState::new(),
            sequence: AtomicU64::new(0),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn is_allowed(&self, sender_id: &str) -> bool {
        self.config.allow_from.is_empty() || self.config.allow_from.iter().any(|id| id == sender_id)
    }

    /// Forward a `MESSAGE_CREATE` to `host` unless it is from a bot or a
    /// disallowed user.
    pub(crate) async fn process_message_create(
        &self,
        msg: &MessageCreate,
        host: &Arc<dyn ChannelHost>,
    ) -> Result<(), ChannelError> {
        if msg.author.bot {
            debug!(author = %msg.author.username, "skipping bot message");
            return Ok(());
        }
        if !self.is_allowed(&msg.author.id) {
            warn!(
                sender_id = %msg.author.id,
                channel_id = %msg.channel_id,
                "message from disallowed user, ignoring"
            );
            return Ok(());
        }

        let mut metadata = HashMap::new();
        metadata.insert("message_id".into(), msg.id.clone().into());
        metadata.insert("username".into(), msg.author.username.clone().into());
        if let Some(ref guild_id) = msg.guild_id {
            metadata.insert("guild_id".into(), guild_id.clone().into());
        }

        let mut inbound =
            InboundMessage::new("discord", &msg.author.id, &msg.channel_id, &msg.content);
        inbound.media = msg.attachments.iter().map(|a| a.url.clone()).collect();
        inbound.metadata = metadata;

        host.deliver_inbound(inbound).await
    }

    fn last_sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }

    fn identify(&self) -> GatewayPayload {
        let identify = IdentifyPayload {
            token: self.config.token.expose().to_owned(),
            intents: self.config.intents,
            properties: ConnectionProperties {
                os: std::env::consts::OS.to_owned(),
                browser: "switchyard".into(),
                device: "switchyard".into(),
            },
        };
        GatewayPayload::new(OP_IDENTIFY, serde_json::to_value(identify).ok())
    }

    /// Connect, identify and pump events until the session ends.
    async fn run_session(&self, host: &Arc<dyn ChannelHost>, cancel: &CancellationToken) -> SessionEnd {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Stopped,
            connected = tokio_tungstenite::connect_async(self.config.gateway_url.as_str()) => connected,
        };
        let (mut write, mut read) = match connected {
            Ok((stream, _)) => stream.split(),
            Err(e) => {
                error!(error = %e, "failed to connect Discord Gateway");
                return SessionEnd::Reconnect(e.to_string());
            }
        };
        info!("Discord Gateway connected");
        self.sequence.store(0, Ordering::SeqCst);

        let heartbeat_ms = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.close().await;
                return SessionEnd::Stopped;
            }
            hello = wait_for_hello(&mut read) => match hello {
                Some(ms) => ms,
                None => return SessionEnd::Reconnect("no Hello from Gateway".into()),
            },
        };
        debug!(interval_ms = heartbeat_ms, "received Hello");

        if let Err(e) = send_payload(&mut write, &self.identify()).await {
            return SessionEnd::Reconnect(format!("failed to send Identify: {e}"));
        }

        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms.max(1)));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Discord channel received stop");
                    let _ = write.close().await;
                    return SessionEnd::Stopped;
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = send_payload(&mut write, &GatewayPayload::heartbeat(self.last_sequence())).await {
                        warn!(error = %e, "failed to send heartbeat");
                        return SessionEnd::Reconnect(e.to_string());
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match self.handle_text(&text, host).await {
                            Flow::Continue => {}
                            Flow::Heartbeat => {
                                let _ = send_payload(&mut write, &GatewayPayload::heartbeat(self.last_sequence())).await;
                            }
                            Flow::Reconnect(reason) => {
                                let _ = write.close().await;
                                return SessionEnd::Reconnect(reason);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        let reason = frame.map(|f| f.reason.into_owned()).unwrap_or_default();
                        info!(code = ?code, reason = %reason, "Discord Gateway closed by server");
                        if let Some(code) = code.filter(|c| FATAL_CLOSE_CODES.contains(c)) {
                            return SessionEnd::Fatal(ChannelError::AuthFailed(format!(
                                "Gateway closed with {code}: {reason}"
                            )));
                        }
                        return SessionEnd::Reconnect(format!("closed by server: {reason}"));
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Discord Gateway WebSocket error");
                        return SessionEnd::Reconnect(e.to_string());
                    }
                    None => return SessionEnd::Reconnect("stream ended".into()),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn handle_text(&self, text: &str, host: &Arc<dyn ChannelHost>) -> Flow {
        let payload: GatewayPayload = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to parse gateway payload");
                return Flow::Continue;
            }
        };
        if let Some(s) = payload.s {
            self.sequence.store(s, Ordering::SeqCst);
        }

        match payload.op {
            OP_DISPATCH => {
                self.handle_dispatch(payload.t.as_deref().unwrap_or_default(), payload.d, host)
                    .await;
                Flow::Continue
            }
            OP_HEARTBEAT => Flow::Heartbeat,
            OP_HEARTBEAT_ACK => {
                debug!("heartbeat acknowledged");
                Flow::Continue
            }
            OP_RECONNECT => Flow::Reconnect("server requested reconnect".into()),
            OP_INVALID_SESSION => Flow::Reconnect("invalid session".into()),
            op => {
                debug!(op, "unhandled opcode");
                Flow::Continue
            }
        }
    }

    async fn handle_dispatch(&self, event: &str, data: Option<serde_json::Value>, host: &Arc<dyn ChannelHost>) {
        let Some(data) = data else { return };
        match event {
            "READY" => match serde_json::from_value::<ReadyEvent>(data) {
                Ok(ready) => {
                    info!(
                        bot_id = %ready.user.id,
                        bot_name = %ready.user.username,
                        session_id = %ready.session_id,
                        "Discord bot authenticated"
                    );
                    self.state.set(ChannelStatus::Running).await;
                }
                Err(e) => warn!(error = %e, "failed to parse READY"),
            },
            "MESSAGE_CREATE" => match serde_json::from_value::<MessageCreate>(data) {
                Ok(msg) => {
                    if let Err(e) = self.process_message_create(&msg, host).await {
                        error!(error = %e, "failed to deliver MESSAGE_CREATE");
                    }
                }
                Err(e) => warn!(error = %e, "failed to parse MESSAGE_CREATE"),
            },
            other => debug!(event = %other, "unhandled dispatch event"),
        }
    }
}

/// Read frames until Hello; `None` if the stream fails first.
async fn wait_for_hello(read: &mut WsRead) -> Option<u64> {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if let Ok(payload) = serde_json::from_str::<GatewayPayload>(&text)
                    && payload.op == OP_HELLO
                    && let Some(d) = payload.d
                    && let Ok(hello) = serde_json::from_value::<HelloData>(d)
                {
                    return Some(hello.heartbeat_interval);
                }
            }
            Ok(WsMessage::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

async fn send_payload(
    write: &mut WsWrite,
    payload: &GatewayPayload,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = serde_json::to_string(payload).unwrap_or_default();
    write.send(WsMessage::Text(json)).await
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn status(&self) -> ChannelStatus {
        self.state.status()
    }

    async fn start(&self, host: Arc<dyn ChannelHost>) -> Result<(), ChannelError> {
        let cancel = self.state.begin().await;
        info!("Discord channel starting");

        loop {
            match self.run_session(&host, &cancel).await {
                SessionEnd::Stopped => break,
                SessionEnd::Fatal(e) => {
                    error!(error = %e, "Discord Gateway rejected the session");
                    self.state.set(ChannelStatus::Error(e.to_string())).await;
                    return Err(e);
                }
                SessionEnd::Reconnect(reason) => {
                    self.state.set(ChannelStatus::Error(reason)).await;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {
                            info!("reconnecting Discord Gateway");
                        }
                    }
                }
            }
        }

        self.state.finish().await;
        info!("Discord channel stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.state.request_stop().await;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, ChannelError> {
        let mut last_id = String::new();
        for (i, chunk) in chunk_message(&msg.content, DISCORD_MAX_MESSAGE_LEN)
            .into_iter()
            .enumerate()
        {
            let reply_to = if i == 0 { msg.reply_to.as_deref() } else { None };
            last_id = self.api.create_message(&msg.chat_id, chunk, reply_to).await?;
        }
        Ok(MessageId(last_id))
    }
}
