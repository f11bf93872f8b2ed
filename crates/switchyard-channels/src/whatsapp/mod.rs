//! WhatsApp integration through a local bridge process.
//!
//! The bridge owns the WhatsApp Web session and speaks JSON frames over
//! a WebSocket; this channel is its client.

pub mod channel;
pub mod types;

pub use channel::{WhatsAppChannel, WhatsAppChannelFactory};
pub use types::WhatsAppConfig;
