//! Discord integration: Gateway WebSocket for inbound, REST for outbound.
//!
//! - [`events`] -- Gateway payload types and opcodes
//! - [`api`] -- REST client for sending messages
//! - [`channel`] -- the [`Channel`](crate::traits::Channel) implementation
//! - [`factory`] -- config section and factory

pub mod api;
pub mod channel;
pub mod events;
pub mod factory;

pub use channel::DiscordChannel;
pub use factory::{DiscordChannelFactory, DiscordConfig};
