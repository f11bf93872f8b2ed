//! CLI command implementations for `yard`.
//!
//! - [`gateway`] -- Channel gateway with the outbound dispatch loop.
//! - [`channels`] -- Channel configuration table.

pub mod channels;
pub mod gateway;

use std::path::Path;

use switchyard_types::config::Config;

/// Load configuration from the given path override or via auto-discovery.
///
/// Discovery order:
/// 1. `SWITCHYARD_CONFIG` env var
/// 2. `~/.switchyard/config.json`
///
/// Returns a default `Config` if no config file is found.
pub async fn load_config(config_override: Option<&str>) -> anyhow::Result<Config> {
    switchyard_core::config_loader::load_config(config_override.map(Path::new))
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))
}
