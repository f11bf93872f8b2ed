//! `channels.discord` config section and [`DiscordChannelFactory`].

use std::sync::Arc;

use serde::Deserialize;

use switchyard_types::error::ChannelError;
use switchyard_types::secret::SecretString;

use crate::traits::{Channel, ChannelFactory};

use super::channel::DiscordChannel;

/// Gateway v10, JSON encoding.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT.
pub const DEFAULT_INTENTS: u32 = 37377;

/// ```json
/// {
///   "enabled": true,
///   "token": "Bot-Token-Here",
///   "allow_from": ["123456789"],
///   "intents": 37377
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: SecretString,
    /// Environment variable to read the token from when `token` is empty.
    pub token_env: Option<String>,
    /// User ids allowed to talk to the bot. Empty allows everyone.
    pub allow_from: Vec<String>,
    pub gateway_url: String,
    pub intents: u32,
    /// REST endpoint override.
    pub api_base: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: SecretString::default(),
            token_env: None,
            allow_from: Vec::new(),
            gateway_url: DEFAULT_GATEWAY_URL.into(),
            intents: DEFAULT_INTENTS,
            api_base: None,
        }
    }
}

/// Builds [`DiscordChannel`]s from a [`DiscordConfig`] section.
pub struct DiscordChannelFactory;

impl ChannelFactory for DiscordChannelFactory {
    fn channel_name(&self) -> &str {
        "discord"
    }

    fn build(&self, config: &serde_json::Value) -> Result<Arc<dyn Channel>, ChannelError> {
        let mut config: DiscordConfig = serde_json::from_value(config.clone())
            .map_err(|e| ChannelError::InvalidConfig(format!("discord: {e}")))?;

        config.token = config.token.or_env(config.token_env.as_deref());
        if config.token.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "missing 'token' in discord config".into(),
            ));
        }

        Ok(Arc::new(DiscordChannel::new(config)))
    }
}
