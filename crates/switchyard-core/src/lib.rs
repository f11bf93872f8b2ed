//! # switchyard-core
//!
//! - **[`bus`]** -- [`MessageBus`](bus::MessageBus), the inbound/outbound
//!   queue pair between channels and the processing core
//! - **[`config_loader`]** -- config file discovery and loading

pub mod bus;
pub mod config_loader;

pub use bus::{MessageBus, Received};
