//! Chat channels for switchyard.
//!
//! Each platform implements [`Channel`] and is built by a
//! [`ChannelFactory`] looked up in a [`ChannelRegistry`]. The
//! [`ChannelManager`] owns the enabled channels, runs each in its own
//! task and routes the bus's outbound queue to them.
//!
//! ```text
//! config ──> ChannelRegistry::build() ──> Arc<dyn Channel>
//!                                            │
//!                              ChannelManager::start_all()
//!                               │                     │
//!                 Channel::start(BusHost)     outbound dispatch loop
//!                               │                     │
//!                   bus.publish_inbound()    bus.consume_outbound_timeout()
//!                                                     │
//!                                              Channel::send()
//! ```
//!
//! Platform integrations sit behind the `telegram`, `discord` and
//! `whatsapp` cargo features (all on by default).

#[cfg(any(feature = "telegram", feature = "discord"))]
mod chunk;
#[cfg(feature = "discord")]
pub mod discord;
pub mod host;
pub mod manager;
pub mod registry;
pub mod state;
#[cfg(feature = "telegram")]
pub mod telegram;
pub mod traits;
#[cfg(feature = "whatsapp")]
pub mod whatsapp;

pub use host::BusHost;
pub use manager::{ChannelManager, ChannelStatusEntry, ManagerOptions};
pub use registry::{ChannelRegistry, UnavailableFactory};
pub use state::ChannelState;
pub use traits::*;

pub use switchyard_types::error::ChannelError;
