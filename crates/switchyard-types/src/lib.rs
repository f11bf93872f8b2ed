//! # switchyard-types
//!
//! Shared type definitions for switchyard. Every other crate in the
//! workspace depends on this one. It contains:
//!
//! - **[`event`]** -- [`InboundMessage`](event::InboundMessage) and
//!   [`OutboundMessage`](event::OutboundMessage), the envelopes carried
//!   by the message bus
//! - **[`error`]** -- [`SwitchyardError`] and [`ChannelError`]
//! - **[`config`]** -- configuration schema (channels, bus, gateway)
//! - **[`secret`]** -- [`SecretString`](secret::SecretString) for
//!   credentials

pub mod config;
pub mod error;
pub mod event;
pub mod secret;

pub use error::{ChannelError, Result, SwitchyardError};
