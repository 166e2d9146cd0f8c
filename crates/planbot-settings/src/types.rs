//! Settings types with their compiled defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

pub const DEFAULT_TOPIC_NAME: &str = "Планы";
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanbotSettings {
    pub server: ServerSettings,
    pub telegram: TelegramSettings,
    pub storage: StorageSettings,
    pub schedule: ScheduleSettings,
    pub logging: LoggingSettings,
}

impl PlanbotSettings {
    /// Checks that must pass before the service starts.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.expose_secret().trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "telegram.botToken is empty (set BOT_TOKEN)".into(),
            ));
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.webhookPath must start with '/': {}",
                self.server.webhook_path
            )));
        }
        if self.telegram.topic_name.trim().is_empty() {
            return Err(SettingsError::InvalidValue("telegram.topicName is empty".into()));
        }
        self.schedule.timezone()?;
        Ok(())
    }
}

/// Secrets are read from files and the environment but never serialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub webhook_path: String,
    /// Externally reachable base URL; a bare host gets `https://` prepended.
    pub public_url: Option<String>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<SecretString>,
    /// Required `?token=` on the cleanup endpoint when set.
    #[serde(skip_serializing)]
    pub cleanup_token: Option<SecretString>,
}

impl ServerSettings {
    /// Full webhook URL to register with Telegram, if a public URL is known.
    pub fn webhook_url(&self) -> Option<String> {
        let base = self.public_url.as_deref()?.trim().trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        let base = if base.starts_with("https://") || base.starts_with("http://") {
            base.to_string()
        } else {
            format!("https://{base}")
        };
        Some(format!("{base}{}", self.webhook_path))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10000,
            webhook_path: "/webhook".into(),
            public_url: None,
            webhook_secret: None,
            cleanup_token: None,
        }
    }
}

/// A forum thread that is always treated as the plans thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRef {
    pub chat_id: i64,
    pub thread_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramSettings {
    #[serde(skip_serializing)]
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub topic_name: String,
    pub pinned_threads: Vec<ThreadRef>,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: SecretString::default(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            topic_name: DEFAULT_TOPIC_NAME.into(),
            pinned_threads: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    pub data_file: PathBuf,
    pub archive_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data.json"),
            archive_dir: PathBuf::from("archive"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSettings {
    /// IANA name; decides which calendar day "today" is.
    pub timezone: String,
}

impl ScheduleSettings {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| SettingsError::InvalidValue(format!("unknown timezone {:?}", self.timezone)))
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
    /// Per-target level overrides, e.g. `{"planbot_store": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "json".into(),
            modules: BTreeMap::new(),
        }
    }
}
