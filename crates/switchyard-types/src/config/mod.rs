//! Configuration schema.
//!
//! All structs accept missing fields (every field has a default) and
//! ignore unknown ones. Keys are expected in `snake_case`; the loader in
//! `switchyard-core` normalizes `camelCase` files before deserializing.
//!
//! ```json
//! {
//!   "channels": {
//!     "telegram": { "enabled": true, "token": "123:ABC", "allow_from": ["42"] },
//!     "discord":  { "enabled": false }
//!   },
//!   "bus": { "capacity": 1024 },
//!   "gateway": { "dispatch_poll_ms": 1000, "stop_timeout_secs": 10 }
//! }
//! ```

pub mod channels;

pub use channels::{ChannelSection, ChannelsConfig, KNOWN_CHANNELS};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Per-channel sections, keyed by channel name.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Message bus sizing.
    #[serde(default)]
    pub bus: BusConfig,

    /// Dispatch loop and shutdown tuning.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Message bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Capacity of each queue. Publishers wait once a queue holds this
    /// many undelivered messages.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

fn default_bus_capacity() -> usize {
    1024
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

/// Outbound dispatch and shutdown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// How long the dispatch loop waits for a message before re-checking
    /// for cancellation, in milliseconds.
    #[serde(default = "default_dispatch_poll_ms")]
    pub dispatch_poll_ms: u64,

    /// Upper bound on each channel's `stop()` during shutdown, in
    /// seconds. `0` waits indefinitely.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

fn default_dispatch_poll_ms() -> u64 {
    1000
}

fn default_stop_timeout_secs() -> u64 {
    10
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            dispatch_poll_ms: default_dispatch_poll_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Dispatch poll interval (never zero).
    pub fn dispatch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_poll_ms.max(1))
    }

    /// Per-channel stop timeout, or `None` when disabled.
    pub fn stop_timeout(&self) -> Option<Duration> {
        (self.stop_timeout_secs > 0).then(|| Duration::from_secs(self.stop_timeout_secs))
    }
}
