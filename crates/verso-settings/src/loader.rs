//! Deep merge rules: objects merge recursively, arrays and primitives are
//! replaced by the source, and `null` in the source keeps the target value.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use verso_core::security::ApiKey;

use crate::errors::Result;
use crate::types::VersoSettings;

/// `~/.verso/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".verso").join("settings.json")
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

pub fn load_settings() -> Result<VersoSettings> {
    load_settings_from_path(&settings_path())
}

/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<VersoSettings> {
    let mut settings = merge_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn merge_file(path: &Path) -> Result<VersoSettings> {
    let defaults = serde_json::to_value(VersoSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Environment overrides. Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut VersoSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

fn apply_overrides(settings: &mut VersoSettings, env: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| env(name).filter(|v| !v.is_empty());

    if let Some(v) = read("VERSO_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = read("VERSO_DICTIONARY_DIR") {
        settings.dictionary.dir = v;
    }
    if let Some(v) = read("VERSO_MIN_PACKET") {
        if let Some(n) = checked("VERSO_MIN_PACKET", &v, parse_usize_range(&v, 1, 1000)) {
            settings.packets.min_size = n;
        }
    }
    if let Some(v) = read("VERSO_MAX_PACKET") {
        if let Some(n) = checked("VERSO_MAX_PACKET", &v, parse_usize_range(&v, 1, 1000)) {
            settings.packets.max_size = n;
        }
    }
    if let Some(v) = read("VERSO_STYLE") {
        if let Some(style) = checked("VERSO_STYLE", &v, v.parse().ok()) {
            settings.generation.style = style;
        }
    }
    if let Some(v) = read("VERSO_MODEL") {
        settings.llm.model = Some(v);
    }
    if let Some(v) = read("VERSO_LLM_PROVIDER") {
        if let Some(kind) = checked("VERSO_LLM_PROVIDER", &v, v.parse().ok()) {
            settings.llm.provider = kind;
        }
    }
    if let Some(v) = read("VERSO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("VERSO_LOG_JSON") {
        if let Some(b) = checked("VERSO_LOG_JSON", &v, parse_bool(&v)) {
            settings.logging.json = b;
        }
    }
    if let Some(v) = read("ANTHROPIC_API_KEY") {
        settings.llm.api_key = Some(ApiKey::new(v));
    }
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use crate::types::ProviderKind;
    use std::collections::HashMap;
    use verso_core::PoemStyle;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"packets": {"minSize": 5, "maxSize": 10}});
        let source = serde_json::json!({"packets": {"maxSize": 20}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["packets"]["maxSize"], 20);
        assert_eq!(merged["packets"]["minSize"], 5);
    }

    #[test]
    fn merge_null_keeps_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_replaces_arrays() {
        let merged = deep_merge(
            serde_json::json!({"warmLetters": ["t", "a"]}),
            serde_json::json!({"warmLetters": ["z"]}),
        );
        assert_eq!(merged["warmLetters"], serde_json::json!(["z"]));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = merge_file(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.packets.min_size, 5);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"store": {"dbPath": "/data/lineage.db"}, "generation": {"orderFallback": "keep_cursor"}}"#,
        )
        .unwrap();

        let settings = merge_file(&path).unwrap();
        assert_eq!(settings.store.db_path, "/data/lineage.db");
        assert_eq!(
            settings.generation.order_fallback,
            verso_core::OrderFallback::KeepCursor
        );
        assert_eq!(settings.generation.max_tokens, 1024);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(merge_file(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn invalid_bounds_rejected_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"packets": {"minSize": 9, "maxSize": 4}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = VersoSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("VERSO_DB_PATH", "/tmp/x.db"),
                ("VERSO_MIN_PACKET", "3"),
                ("VERSO_MAX_PACKET", "8"),
                ("VERSO_STYLE", "limerick"),
                ("VERSO_LLM_PROVIDER", "mock"),
                ("VERSO_LOG_JSON", "yes"),
                ("ANTHROPIC_API_KEY", "sk-env"),
            ]),
        );
        assert_eq!(settings.store.db_path, "/tmp/x.db");
        assert_eq!(settings.packets.min_size, 3);
        assert_eq!(settings.packets.max_size, 8);
        assert_eq!(settings.generation.style, PoemStyle::Limerick);
        assert_eq!(settings.llm.provider, ProviderKind::Mock);
        assert!(settings.logging.json);
        assert_eq!(settings.llm.api_key.as_ref().unwrap().expose(), "sk-env");
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = VersoSettings::default();
        apply_overrides(
            &mut settings,
            env_of(&[
                ("VERSO_MIN_PACKET", "zero"),
                ("VERSO_STYLE", "sonnet"),
                ("VERSO_LOG_JSON", "maybe"),
                ("VERSO_MODEL", ""),
            ]),
        );
        assert_eq!(settings.packets.min_size, 5);
        assert_eq!(settings.generation.style, PoemStyle::FreeVerse);
        assert!(!settings.logging.json);
        assert!(settings.llm.model.is_none());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_usize_range("5", 1, 10), Some(5));
        assert_eq!(parse_usize_range("0", 1, 10), None);
    }

    #[test]
    fn expand_home_only_touches_tilde() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert!(!expand_home("~/x.db").starts_with("~"));
    }
}
