//! Message bus between channels and the processing core.
//!
//! [`MessageBus`] is a pair of independent FIFO queues backed by bounded
//! tokio MPSC channels:
//!
//! - **inbound**: channels publish what users write; the processing core
//!   consumes it.
//! - **outbound**: the processing core publishes replies; the channel
//!   manager's dispatch loop consumes them.
//!
//! Each queue is multi-producer / single-consumer. Ordering is FIFO within
//! a queue and unspecified across the two. The capacity bound is the only
//! source of backpressure: async publishers wait for room, sync publishers
//! get an error.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace};

use switchyard_types::config::BusConfig;
use switchyard_types::error::SwitchyardError;
use switchyard_types::event::{InboundMessage, OutboundMessage};

/// Default capacity of each queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Outcome of a consume call bounded by a timeout.
#[derive(Debug, PartialEq)]
pub enum Received<T> {
    /// A message was dequeued.
    Message(T),
    /// No message arrived before the timeout.
    TimedOut,
    /// Every sender is gone and the queue is drained.
    Closed,
}

impl<T> Received<T> {
    /// The message, if one was received.
    pub fn into_message(self) -> Option<T> {
        match self {
            Self::Message(msg) => Some(msg),
            Self::TimedOut | Self::Closed => None,
        }
    }
}

/// In-process inbound/outbound queue pair.
pub struct MessageBus {
    inbound_tx: Sender<InboundMessage>,
    inbound_rx: Mutex<Receiver<InboundMessage>>,
    outbound_tx: Sender<OutboundMessage>,
    outbound_rx: Mutex<Receiver<OutboundMessage>>,
    capacity: usize,
}

impl MessageBus {
    /// Create a bus with the default capacity (1024 per queue).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus holding at most `capacity` undelivered messages per
    /// queue. A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

        debug!(capacity, "message bus created");

        Self {
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
            capacity,
        }
    }

    /// Create a bus sized from configuration.
    pub fn from_config(config: &BusConfig) -> Self {
        Self::with_capacity(config.capacity)
    }

    /// Per-queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ── inbound ─────────────────────────────────────────────────────

    /// Enqueue an inbound message, waiting while the queue is full.
    pub async fn publish_inbound(&self, msg: InboundMessage) -> Result<(), SwitchyardError> {
        trace!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing inbound message");
        self.inbound_tx
            .send(msg)
            .await
            .map_err(|_| SwitchyardError::Bus("inbound queue closed".into()))
    }

    /// Enqueue an inbound message without waiting.
    ///
    /// Fails when the queue is full instead of applying backpressure.
    pub fn try_publish_inbound(&self, msg: InboundMessage) -> Result<(), SwitchyardError> {
        trace!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing inbound message");
        try_enqueue(&self.inbound_tx, msg, "inbound")
    }

    /// Wait for the next inbound message.
    ///
    /// Returns `None` once the queue is closed and drained, which cannot
    /// happen while the bus itself is alive.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound_rx.lock().await.recv().await
    }

    /// Wait at most `timeout` for the next inbound message.
    pub async fn consume_inbound_timeout(&self, timeout: Duration) -> Received<InboundMessage> {
        recv_within(&self.inbound_rx, timeout).await
    }

    /// A cloneable producer handle for the inbound queue.
    pub fn inbound_sender(&self) -> Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    // ── outbound ────────────────────────────────────────────────────

    /// Enqueue an outbound message, waiting while the queue is full.
    pub async fn publish_outbound(&self, msg: OutboundMessage) -> Result<(), SwitchyardError> {
        trace!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing outbound message");
        self.outbound_tx
            .send(msg)
            .await
            .map_err(|_| SwitchyardError::Bus("outbound queue closed".into()))
    }

    /// Enqueue an outbound message without waiting.
    pub fn try_publish_outbound(&self, msg: OutboundMessage) -> Result<(), SwitchyardError> {
        trace!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing outbound message");
        try_enqueue(&self.outbound_tx, msg, "outbound")
    }

    /// Wait for the next outbound message.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Wait at most `timeout` for the next outbound message.
    ///
    /// The dispatch loop uses this so that waiting interleaves with
    /// cancellation checks.
    pub async fn consume_outbound_timeout(&self, timeout: Duration) -> Received<OutboundMessage> {
        recv_within(&self.outbound_rx, timeout).await
    }

    /// A cloneable producer handle for the outbound queue.
    pub fn outbound_sender(&self) -> Sender<OutboundMessage> {
        self.outbound_tx.clone()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

fn try_enqueue<T>(tx: &Sender<T>, msg: T, queue: &str) -> Result<(), SwitchyardError> {
    tx.try_send(msg).map_err(|e| match e {
        TrySendError::Full(_) => SwitchyardError::Bus(format!("{queue} queue full (backpressure)")),
        TrySendError::Closed(_) => SwitchyardError::Bus(format!("{queue} queue closed")),
    })
}

async fn recv_within<T>(rx: &Mutex<Receiver<T>>, timeout: Duration) -> Received<T> {
    let next = async { rx.lock().await.recv().await };
    match tokio::time::timeout(timeout, next).await {
        Ok(Some(msg)) => Received::Message(msg),
        Ok(None) => Received::Closed,
        Err(_) => Received::TimedOut,
    }
}
