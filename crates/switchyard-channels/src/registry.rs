//! Name-keyed registry of [`ChannelFactory`] implementations.

use std::collections::HashMap;
use std::sync::Arc;

use switchyard_types::error::ChannelError;

use crate::traits::{Channel, ChannelFactory};

/// Maps channel names to the factories that build them.
pub struct ChannelRegistry {
    factories: HashMap<String, Arc<dyn ChannelFactory>>,
}

impl ChannelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with every first-party integration.
    ///
    /// Integrations compiled out via cargo features are registered as
    /// [`UnavailableFactory`] placeholders, so enabling them in config
    /// produces a clear warning instead of silence.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "telegram")]
        registry.register(Arc::new(crate::telegram::TelegramChannelFactory));
        #[cfg(not(feature = "telegram"))]
        registry.register(Arc::new(UnavailableFactory::missing_feature("telegram")));

        #[cfg(feature = "discord")]
        registry.register(Arc::new(crate::discord::DiscordChannelFactory));
        #[cfg(not(feature = "discord"))]
        registry.register(Arc::new(UnavailableFactory::missing_feature("discord")));

        #[cfg(feature = "whatsapp")]
        registry.register(Arc::new(crate::whatsapp::WhatsAppChannelFactory));
        #[cfg(not(feature = "whatsapp"))]
        registry.register(Arc::new(UnavailableFactory::missing_feature("whatsapp")));

        registry.register(Arc::new(UnavailableFactory::new(
            "feishu",
            "no feishu integration is bundled with this build",
        )));

        registry
    }

    /// Register a factory under its channel name, replacing any previous
    /// one. Returns the replaced factory.
    pub fn register(&mut self, factory: Arc<dyn ChannelFactory>) -> Option<Arc<dyn ChannelFactory>> {
        self.factories
            .insert(factory.channel_name().to_owned(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Whether `name` has a factory that can actually build channels.
    pub fn is_available(&self, name: &str) -> bool {
        self.factories.get(name).is_some_and(|f| f.is_available())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the channel `name` from its config section.
    pub fn build(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            ChannelError::Unavailable(format!("no integration registered for '{name}'"))
        })?;
        factory.build(config)
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Placeholder factory for a platform that cannot run in this build.
pub struct UnavailableFactory {
    name: String,
    reason: String,
}

impl UnavailableFactory {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Placeholder for an integration behind a disabled cargo feature of
    /// the same name.
    pub fn missing_feature(name: &str) -> Self {
        Self::new(name, format!("built without the `{name}` feature"))
    }
}

impl ChannelFactory for UnavailableFactory {
    fn channel_name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        false
    }

    fn build(&self, _config: &serde_json::Value) -> Result<Arc<dyn Channel>, ChannelError> {
        Err(ChannelError::Unavailable(self.reason.clone()))
    }
}
