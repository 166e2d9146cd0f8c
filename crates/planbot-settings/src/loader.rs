//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn, Level};

use crate::errors::Result;
use crate::types::PlanbotSettings;

/// Settings file used when none is given: `$PLANBOT_CONFIG`, else
/// `planbot.json` in the working directory.
pub fn settings_path() -> PathBuf {
    std::env::var("PLANBOT_CONFIG")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("planbot.json"))
}

/// Load settings from `path` (defaults if it does not exist), then apply the
/// process environment.
///
/// An explicitly requested file that is missing is an error; the default
/// path is allowed to be absent.
pub fn load_settings(path: Option<&Path>) -> Result<PlanbotSettings> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (settings_path(), false),
    };
    let mut settings = load_file(&path, required)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn load_file(path: &Path, required: bool) -> Result<PlanbotSettings> {
    let defaults = serde_json::to_value(PlanbotSettings::default())?;

    let merged = if required || path.exists() {
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

/// Recursive deep merge of two JSON values.
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

/// Apply environment overrides read through `lookup`.
///
/// Empty values are treated as unset; values that do not parse (ports,
/// timezones, log levels and formats) are ignored with a warning.
pub fn apply_env_overrides<F>(settings: &mut PlanbotSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    // ── Hosting platform conventions ────────────────────────────────
    if let Some(v) = var("BOT_TOKEN") {
        settings.telegram.bot_token = SecretString::from(v);
    }
    if let Some(v) = var("PORT") {
        match v.trim().parse::<u16>() {
            Ok(port) if port > 0 => settings.server.port = port,
            _ => warn!(key = "PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = var("RENDER_EXTERNAL_URL") {
        settings.server.public_url = Some(v);
    }

    // ── PLANBOT_* ───────────────────────────────────────────────────
    if let Some(v) = var("PLANBOT_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = var("PLANBOT_PUBLIC_URL") {
        settings.server.public_url = Some(v);
    }
    if let Some(v) = var("PLANBOT_WEBHOOK_SECRET") {
        settings.server.webhook_secret = Some(SecretString::from(v));
    }
    if let Some(v) = var("PLANBOT_CLEANUP_TOKEN") {
        settings.server.cleanup_token = Some(SecretString::from(v));
    }
    if let Some(v) = var("PLANBOT_TOPIC_NAME") {
        settings.telegram.topic_name = v;
    }
    if let Some(v) = var("PLANBOT_DATA_FILE") {
        settings.storage.data_file = PathBuf::from(v);
    }
    if let Some(v) = var("PLANBOT_ARCHIVE_DIR") {
        settings.storage.archive_dir = PathBuf::from(v);
    }
    if let Some(v) = var("PLANBOT_TIMEZONE") {
        match v.trim().parse::<Tz>() {
            Ok(_) => settings.schedule.timezone = v.trim().to_string(),
            Err(_) => warn!(key = "PLANBOT_TIMEZONE", value = %v, "unknown timezone env var, ignoring"),
        }
    }
    if let Some(v) = var("PLANBOT_LOG_LEVEL") {
        match Level::from_str(v.trim()) {
            Ok(level) => settings.logging.level = level.to_string().to_lowercase(),
            Err(_) => warn!(key = "PLANBOT_LOG_LEVEL", value = %v, "unknown log level env var, ignoring"),
        }
    }
    if let Some(v) = var("PLANBOT_LOG_FORMAT") {
        match v.trim().to_ascii_lowercase().as_str() {
            "json" => settings.logging.format = "json".into(),
            "pretty" | "text" => settings.logging.format = "pretty".into(),
            _ => warn!(key = "PLANBOT_LOG_FORMAT", value = %v, "unknown log format env var, ignoring"),
        }
    }
}
