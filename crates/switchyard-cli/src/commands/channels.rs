//! `yard channels` -- inspect channel configuration status.
//!
//! Lists every known or configured channel, whether its config section
//! enables it, and whether this build carries an integration for it.
//!
//! # Example
//!
//! ```text
//! yard channels status
//! ```

use std::collections::BTreeSet;

use comfy_table::{Table, presets::UTF8_FULL};

use switchyard_channels::ChannelRegistry;
use switchyard_types::config::{Config, KNOWN_CHANNELS};

/// One line of the status table.
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelRow {
    pub name: String,
    pub enabled: bool,
    pub configured: bool,
    pub available: bool,
}

impl ChannelRow {
    fn config_status(&self) -> &'static str {
        match (self.enabled, self.available) {
            (true, true) => "will start",
            (true, false) => "ENABLED but no integration",
            (false, _) if self.configured => "disabled",
            (false, _) => "not configured",
        }
    }
}

/// Rows for every known channel plus any extra configured name, in name
/// order.
pub fn status_rows(config: &Config, registry: &ChannelRegistry) -> Vec<ChannelRow> {
    let names: BTreeSet<&str> = KNOWN_CHANNELS
        .iter()
        .copied()
        .chain(config.channels.iter().map(|(name, _)| name))
        .collect();

    names
        .into_iter()
        .map(|name| ChannelRow {
            name: name.to_owned(),
            enabled: config.channels.is_enabled(name),
            configured: config.channels.get(name).is_some(),
            available: registry.is_available(name),
        })
        .collect()
}

/// Render the rows as a table.
pub fn render(rows: &[ChannelRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["CHANNEL", "ENABLED", "INTEGRATION", "STATUS"]);

    for row in rows {
        table.add_row([
            row.name.as_str(),
            if row.enabled { "yes" } else { "no" },
            if row.available { "built in" } else { "missing" },
            row.config_status(),
        ]);
    }
    table
}

/// Display a table of channel status from the given configuration.
pub fn channels_status(config: &Config) {
    let rows = status_rows(config, &ChannelRegistry::with_builtin());
    println!("{}", render(&rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_types::config::ChannelSection;

    fn row<'a>(rows: &'a [ChannelRow], name: &str) -> &'a ChannelRow {
        rows.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn defaults_list_known_channels_disabled() {
        let rows = status_rows(&Config::default(), &ChannelRegistry::with_builtin());
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["discord", "feishu", "telegram", "whatsapp"]);
        assert!(rows.iter().all(|r| !r.enabled && !r.configured));
        assert_eq!(row(&rows, "telegram").config_status(), "not configured");
    }

    #[test]
    fn feishu_is_never_available() {
        let mut cfg = Config::default();
        cfg.channels
            .insert("feishu", ChannelSection::enabled(json!({"app_id": "x"})));
        let rows = status_rows(&cfg, &ChannelRegistry::with_builtin());
        let feishu = row(&rows, "feishu");
        assert!(feishu.enabled);
        assert!(!feishu.available);
        assert_eq!(feishu.config_status(), "ENABLED but no integration");
    }

    #[test]
    fn extra_channels_are_listed() {
        let mut cfg = Config::default();
        cfg.channels
            .insert("matrix", ChannelSection::enabled(json!({})));
        let rows = status_rows(&cfg, &ChannelRegistry::with_builtin());
        assert_eq!(rows.len(), KNOWN_CHANNELS.len() + 1);
        assert!(!row(&rows, "matrix").available);
    }

    #[test]
    fn disabled_section_is_reported() {
        let mut cfg = Config::default();
        cfg.channels.insert(
            "telegram",
            ChannelSection {
                enabled: false,
                ..ChannelSection::default()
            },
        );
        let rows = status_rows(&cfg, &ChannelRegistry::with_builtin());
        assert_eq!(row(&rows, "telegram").config_status(), "disabled");
    }

    #[test]
    fn render_includes_every_row() {
        let rows = status_rows(&Config::default(), &ChannelRegistry::with_builtin());
        let rendered = render(&rows).to_string();
        for name in KNOWN_CHANNELS {
            assert!(rendered.contains(name));
        }
        assert!(rendered.contains("INTEGRATION"));
    }

    #[test]
    fn channels_status_with_defaults_does_not_panic() {
        channels_status(&Config::default());
    }
}
