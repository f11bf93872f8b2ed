//! Telegram Bot API integration (long polling).
//!
//! - [`types`] -- Bot API request/response types
//! - [`client`] -- HTTP client for the endpoints the channel uses
//! - [`channel`] -- the [`Channel`](crate::traits::Channel) implementation
//!   and its factory

pub mod channel;
pub mod client;
pub mod types;

pub use channel::{TelegramChannel, TelegramChannelFactory, TelegramConfig};
pub use client::TelegramClient;

#[cfg(test)]
mod tests;
