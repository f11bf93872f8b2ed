//! [`WhatsAppChannel`] -- bridge WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use switchyard_types::error::ChannelError;
use switchyard_types::event::{InboundMessage, OutboundMessage};

use crate::state::ChannelState;
use crate::traits::{Channel, ChannelFactory, ChannelHost, ChannelStatus, MessageId};

use super::types::{BridgeCommand, BridgeEvent, BridgeMessage, WhatsAppConfig};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// WhatsApp via a bridge process.
///
/// Outbound frames go through an in-memory queue drained by the
/// connection task, so `send` never touches the socket directly and
/// fails fast with [`ChannelError::NotConnected`] between connections.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    state: ChannelState,
    outbox: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reconnect_delay: Duration,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            state: ChannelState::new(),
            outbox: Mutex::new(None),
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn is_allowed(&self, number: &str) -> bool {
        self.config.allow_from.is_empty() || self.config.allow_from.iter().any(|n| n == number)
    }

    async fn handle_frame(&self, text: &str, host: &Arc<dyn ChannelHost>) {
        match BridgeEvent::parse(text) {
            Ok(BridgeEvent::Message(msg)) => {
                if let Err(e) = self.process_message(msg, host).await {
                    error!(error = %e, "failed to deliver WhatsApp message");
                }
            }
            Ok(BridgeEvent::Status(status)) => {
                info!(status = %status, "WhatsApp bridge status");
                match status.as_str() {
                    "connected" => self.state.set(ChannelStatus::Running).await,
                    "disconnected" => {
                        self.state
                            .set(ChannelStatus::Error("bridge lost its WhatsApp session".into()))
                            .await
                    }
                    _ => {}
                }
            }
            Ok(BridgeEvent::Qr) => info!("scan the QR code shown by the WhatsApp bridge"),
            Ok(BridgeEvent::Error(e)) => error!(error = %e, "WhatsApp bridge error"),
            Ok(BridgeEvent::Other(kind)) => debug!(kind = %kind, "ignoring bridge frame"),
            Err(e) => warn!(error = %e, "failed to parse bridge frame"),
        }
    }

    pub(crate) async fn process_message(
        &self,
        msg: BridgeMessage,
        host: &Arc<dyn ChannelHost>,
    ) -> Result<(), ChannelError> {
        let sender_id = msg.sender_number().to_owned();
        if !self.is_allowed(&sender_id) {
            warn!(sender_id = %sender_id, "message from disallowed number, ignoring");
            return Ok(());
        }

        let mut metadata = HashMap::new();
        if let Some(ref id) = msg.id {
            metadata.insert("message_id".into(), id.clone().into());
        }
        metadata.insert("is_group".into(), msg.is_group.into());

        let mut inbound = InboundMessage::new("whatsapp", sender_id, &msg.sender, msg.content);
        if let Some(ts) = msg.timestamp.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)) {
            inbound.timestamp = ts;
        }
        inbound.metadata = metadata;

        host.deliver_inbound(inbound).await
    }

    /// One bridge connection. Returns `true` when stopped, `false` when
    /// the connection was lost.
    async fn run_connection(&self, host: &Arc<dyn ChannelHost>, cancel: &CancellationToken) -> bool {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return true,
            connected = tokio_tungstenite::connect_async(self.config.bridge_url.as_str()) => connected,
        };
        let (mut write, mut read) = match connected {
            Ok((stream, _)) => stream.split(),
            Err(e) => {
                error!(error = %e, url = %self.config.bridge_url, "failed to connect WhatsApp bridge");
                self.state.set(ChannelStatus::Error(e.to_string())).await;
                return false;
            }
        };
        info!(url = %self.config.bridge_url, "WhatsApp bridge connected");

        if !self.config.bridge_token.is_empty() {
            let auth = BridgeCommand::Auth {
                token: self.config.bridge_token.expose().to_owned(),
            };
            let frame = serde_json::to_string(&auth).unwrap_or_default();
            if let Err(e) = write.send(WsMessage::Text(frame)).await {
                self.state.set(ChannelStatus::Error(e.to_string())).await;
                return false;
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.outbox.lock().await = Some(tx);
        self.state.set(ChannelStatus::Running).await;

        let stopped = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.close().await;
                    break true;
                }
                Some(frame) = rx.recv() => {
                    if let Err(e) = write.send(WsMessage::Text(frame)).await {
                        warn!(error = %e, "failed to write to WhatsApp bridge");
                        break false;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text, host).await,
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = write.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("WhatsApp bridge closed the connection");
                        break false;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "WhatsApp bridge WebSocket error");
                        break false;
                    }
                    Some(Ok(_)) => {}
                },
            }
        };

        *self.outbox.lock().await = None;
        if !stopped {
            self.state
                .set(ChannelStatus::Error("bridge disconnected".into()))
                .await;
        }
        stopped
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn status(&self) -> ChannelStatus {
        self.state.status()
    }

    async fn start(&self, host: Arc<dyn ChannelHost>) -> Result<(), ChannelError> {
        let cancel = self.state.begin().await;

        while !self.run_connection(&host, &cancel).await {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {
                    info!("reconnecting WhatsApp bridge");
                }
            }
        }

        self.state.finish().await;
        info!("WhatsApp channel stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        self.state.request_stop().await;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, ChannelError> {
        let frame = serde_json::to_string(&BridgeCommand::Send {
            to: msg.chat_id.clone(),
            text: msg.content.clone(),
        })
        .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let outbox = self.outbox.lock().await;
        let tx = outbox.as_ref().ok_or(ChannelError::NotConnected)?;
        tx.send(frame).map_err(|_| ChannelError::NotConnected)?;
        Ok(MessageId(Uuid::new_v4().to_string()))
    }
}

/// Builds [`WhatsAppChannel`]s from a [`WhatsAppConfig`] section.
pub struct WhatsAppChannelFactory;

impl ChannelFactory for WhatsAppChannelFactory {
    fn channel_name(&self) -> &str {
        "whatsapp"
    }

    fn build(&self, config: &serde_json::Value) -> Result<Arc<dyn Channel>, ChannelError> {
        let config: WhatsAppConfig = serde_json::from_value(config.clone())
            .map_err(|e| ChannelError::InvalidConfig(format!("whatsapp: {e}")))?;

        if !config.bridge_url.starts_with("ws://") && !config.bridge_url.starts_with("wss://") {
            return Err(ChannelError::InvalidConfig(format!(
                "whatsapp bridge_url must be a ws:// or wss:// URL, got '{}'",
                config.bridge_url
            )));
        }

        Ok(Arc::new(WhatsAppChannel::new(config)))
    }
}
