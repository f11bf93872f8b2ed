//! The channel contract.
//!
//! - [`Channel`] -- implemented by each platform integration
//! - [`ChannelHost`] -- implemented by the host; channels push inbound
//!   messages through it
//! - [`ChannelFactory`] -- builds a channel from its JSON config section

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use switchyard_types::error::ChannelError;
use switchyard_types::event::{InboundMessage, OutboundMessage};

/// Lifecycle status of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ChannelStatus {
    /// Not started, or `start` has returned.
    Stopped,
    /// Connecting / authenticating.
    Starting,
    /// Connected and processing messages.
    Running,
    /// `stop` was requested; `start` has not returned yet.
    Stopping,
    /// The connection failed; the channel may be retrying.
    Error(String),
}

/// Platform identifier of a sent message, returned by [`Channel::send`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bidirectional connection to one chat platform.
///
/// The `ChannelManager` drives the lifecycle:
///
/// 1. A [`ChannelFactory`] builds the channel from config.
/// 2. [`start`](Channel::start) runs in its own task until
///    [`stop`](Channel::stop) is called or the connection fails for good.
/// 3. [`send`](Channel::send) is called from the outbound dispatch loop.
///
/// Implementations should embed a [`ChannelState`](crate::ChannelState),
/// which provides the status tracking and stop signal.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel identifier (e.g. `"telegram"`).
    fn name(&self) -> &str;

    /// Current lifecycle status. Must not block.
    fn status(&self) -> ChannelStatus;

    /// Whether the channel currently has a live platform connection.
    fn is_running(&self) -> bool {
        self.status() == ChannelStatus::Running
    }

    /// Connect and forward inbound platform events to `host`.
    ///
    /// Long-lived: returns on clean shutdown (after [`stop`](Channel::stop))
    /// or on unrecoverable failure.
    async fn start(&self, host: Arc<dyn ChannelHost>) -> Result<(), ChannelError>;

    /// Ask a running [`start`](Channel::start) to return promptly.
    ///
    /// Must be safe to call when `start` was never called or has already
    /// returned.
    async fn stop(&self) -> Result<(), ChannelError>;

    /// Deliver one outbound message to the platform.
    async fn send(&self, msg: &OutboundMessage) -> Result<MessageId, ChannelError>;
}

/// Services the host exposes to channels.
#[async_trait]
pub trait ChannelHost: Send + Sync {
    /// Hand an inbound message to the processing pipeline.
    async fn deliver_inbound(&self, msg: InboundMessage) -> Result<(), ChannelError>;
}

/// Builds [`Channel`] instances from configuration.
///
/// `build` is the construction-time failure boundary: it returns
/// [`ChannelError::Unavailable`] when the integration cannot run in this
/// build and [`ChannelError::InvalidConfig`] when the section is unusable.
pub trait ChannelFactory: Send + Sync {
    /// The channel name this factory builds (e.g. `"telegram"`).
    fn channel_name(&self) -> &str;

    /// Whether this factory can build channels at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Build a channel from its config section.
    fn build(&self, config: &serde_json::Value) -> Result<Arc<dyn Channel>, ChannelError>;
}
