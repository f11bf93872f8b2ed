//! Configuration discovery and loading.
//!
//! Resolution order:
//!
//! 1. An explicit path (e.g. `yard gateway --config FILE`); it must exist.
//! 2. The `SWITCHYARD_CONFIG` environment variable.
//! 3. `~/.switchyard/config.json`.
//!
//! When nothing is found the default [`Config`] is used. Keys are
//! normalized from `camelCase` to `snake_case` before deserializing, so
//! `"allowFrom"` and `"allow_from"` are equivalent.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use switchyard_types::config::Config;
use switchyard_types::error::SwitchyardError;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "SWITCHYARD_CONFIG";

/// Find the config file to load.
///
/// `env_value` is the value of [`CONFIG_ENV_VAR`], if set; it wins even
/// when the file does not exist (the caller reports that). Otherwise the
/// home directory location is returned only if it exists.
pub fn discover_config_path(env_value: Option<String>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let candidate = home_dir?.join(".switchyard").join("config.json");
    candidate.exists().then_some(candidate)
}

/// Load configuration from `path_override`, or via discovery.
pub async fn load_config(path_override: Option<&Path>) -> Result<Config, SwitchyardError> {
    if let Some(path) = path_override {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(SwitchyardError::ConfigInvalid {
                reason: format!("config file not found: {}", path.display()),
            });
        }
        return load_config_from(path).await;
    }

    let discovered = discover_config_path(std::env::var(CONFIG_ENV_VAR).ok(), dirs::home_dir());
    let Some(path) = discovered else {
        info!("no config file found, using defaults");
        return Ok(Config::default());
    };

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        warn!(path = %path.display(), "config path does not exist, using defaults");
        return Ok(Config::default());
    }

    load_config_from(&path).await
}

/// Read, normalize and deserialize one config file.
pub async fn load_config_from(path: &Path) -> Result<Config, SwitchyardError> {
    debug!(path = %path.display(), "loading config file");

    let contents = tokio::fs::read_to_string(path).await?;
    let raw: Value = serde_json::from_str(&contents).map_err(|e| SwitchyardError::ConfigInvalid {
        reason: format!("failed to parse {}: {e}", path.display()),
    })?;

    serde_json::from_value(normalize_keys(raw)).map_err(|e| SwitchyardError::ConfigInvalid {
        reason: format!("invalid config in {}: {e}", path.display()),
    })
}

/// Convert every object key in `value` from camelCase to snake_case.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| (camel_to_snake(&key), normalize_keys(val)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// Convert one camelCase identifier to snake_case.
///
/// Runs of capitals are kept together: `"HTMLParser"` becomes
/// `"html_parser"`.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            if prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next.is_some_and(|c| c.is_lowercase()))
            {
                out.push('_');
            }
        }
        out.extend(ch.to_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn camel_to_snake_cases() {
        assert_eq!(camel_to_snake("allowFrom"), "allow_from");
        assert_eq!(camel_to_snake("stopTimeoutSecs"), "stop_timeout_secs");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(camel_to_snake("HTMLParser"), "html_parser");
        assert_eq!(camel_to_snake("bridgeURL"), "bridge_url");
        assert_eq!(camel_to_snake("Config"), "config");
        assert_eq!(camel_to_snake(""), "");
    }

    #[test]
    fn normalize_keys_recurses_into_objects_and_arrays() {
        let input = json!({
            "channels": {
                "telegram": {"enabled": true, "allowFrom": ["1"], "tokenEnv": "TG"}
            },
            "list": [{"innerKey": 1}],
            "gateway": {"dispatchPollMs": 5}
        });
        let out = normalize_keys(input);
        assert_eq!(out["channels"]["telegram"]["allow_from"], json!(["1"]));
        assert_eq!(out["channels"]["telegram"]["token_env"], "TG");
        assert_eq!(out["list"][0]["inner_key"], 1);
        assert_eq!(out["gateway"]["dispatch_poll_ms"], 5);
    }

    #[test]
    fn discover_prefers_env_value() {
        let path = discover_config_path(Some("/etc/yard.json".into()), None);
        assert_eq!(path, Some(PathBuf::from("/etc/yard.json")));
    }

    #[test]
    fn discover_nothing_without_env_or_file() {
        let home = tempfile::tempdir().unwrap();
        assert!(discover_config_path(None, Some(home.path().to_path_buf())).is_none());
        assert!(discover_config_path(Some(String::new()), None).is_none());
    }

    #[test]
    fn discover_finds_home_config() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".switchyard");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.json"), "{}").unwrap();

        let found = discover_config_path(None, Some(home.path().to_path_buf()));
        assert_eq!(found, Some(dir.join("config.json")));
    }

    #[tokio::test]
    async fn load_camel_case_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "channels": {{
                    "telegram": {{"enabled": true, "token": "t", "allowFrom": ["42"]}},
                    "discord": {{"enabled": false}}
                }},
                "bus": {{"capacity": 8}},
                "gateway": {{"stopTimeoutSecs": 3}}
            }}"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).await.unwrap();
        assert_eq!(cfg.bus.capacity, 8);
        assert_eq!(cfg.gateway.stop_timeout_secs, 3);
        assert!(cfg.channels.is_enabled("telegram"));
        assert!(!cfg.channels.is_enabled("discord"));
        let telegram = cfg.channels.get("telegram").unwrap();
        assert_eq!(telegram.settings["allow_from"], json!(["42"]));
    }

    #[tokio::test]
    async fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.json")))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchyardError::ConfigInvalid { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = load_config_from(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[tokio::test]
    async fn wrong_shape_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"bus": {{"capacity": "many"}}}}"#).unwrap();

        let err = load_config_from(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }
}
