//! Channel configuration sections.
//!
//! The core only interprets the `enabled` flag of each section. Everything
//! else (tokens, endpoints, allow-lists) is kept as raw JSON and handed to
//! the channel's factory, which parses its own typed config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Channel names with first-party config sections.
pub const KNOWN_CHANNELS: &[&str] = &["telegram", "discord", "whatsapp", "feishu"];

/// One channel's section: the `enabled` flag plus opaque settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSection {
    /// Whether the channel should be started.
    #[serde(default)]
    pub enabled: bool,

    /// Platform-specific settings, passed through untouched.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ChannelSection {
    /// An enabled section with the given settings object. Non-object
    /// values yield empty settings.
    pub fn enabled(settings: Value) -> Self {
        Self {
            enabled: true,
            settings: match settings {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// The section as a single JSON object (settings plus `enabled`),
    /// which is what channel factories receive.
    pub fn to_value(&self) -> Value {
        let mut map = self.settings.clone();
        map.insert("enabled".into(), Value::Bool(self.enabled));
        Value::Object(map)
    }

    /// Whether the named setting holds a non-empty value.
    pub fn has_setting(&self, key: &str) -> bool {
        match self.settings.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// All channel sections, keyed by channel name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelsConfig {
    sections: BTreeMap<String, ChannelSection>,
}

impl ChannelsConfig {
    /// Look up a section by channel name.
    pub fn get(&self, name: &str) -> Option<&ChannelSection> {
        self.sections.get(name)
    }

    /// Whether `name` has a section with `enabled = true`.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| s.enabled)
    }

    /// Insert or replace a section.
    pub fn insert(&mut self, name: impl Into<String>, section: ChannelSection) {
        self.sections.insert(name.into(), section);
    }

    /// All sections in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChannelSection)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Enabled sections in name order.
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &ChannelSection)> {
        self.iter().filter(|(_, s)| s.enabled)
    }

    /// Whether no section is configured.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
