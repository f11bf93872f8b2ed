//! [`ChannelHost`] backed by the message bus.

use std::sync::Arc;

use async_trait::async_trait;

use switchyard_core::bus::MessageBus;
use switchyard_types::error::ChannelError;
use switchyard_types::event::InboundMessage;

use crate::traits::ChannelHost;

/// Publishes channel traffic onto the bus's inbound queue.
///
/// Publishing waits while the queue is full, so a slow consumer slows
/// the channels down rather than growing memory.
pub struct BusHost {
    bus: Arc<MessageBus>,
}

impl BusHost {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ChannelHost for BusHost {
    async fn deliver_inbound(&self, msg: InboundMessage) -> Result<(), ChannelError> {
        self.bus
            .publish_inbound(msg)
            .await
            .map_err(|e| ChannelError::Other(e.to_string()))
    }
}
