use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log collectors.
    #[default]
    Json,
    /// Human-readable multi-line output for local runs.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(TelemetryError::InvalidConfig(format!("unknown log format {other:?}"))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid telemetry config: {0}")]
    InvalidConfig(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "planbot_store" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// Build from the textual level and format found in settings.
    pub fn from_names(level: &str, format: &str) -> Result<Self, TelemetryError> {
        let log_level = Level::from_str(level.trim())
            .map_err(|_| TelemetryError::InvalidConfig(format!("unknown log level {level:?}")))?;
        Ok(Self {
            log_level,
            module_levels: Vec::new(),
            format: format.parse()?,
        })
    }

    /// Add per-module level overrides, e.g. `("planbot_store", "debug")`.
    pub fn with_module_levels<'a>(
        mut self,
        modules: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, TelemetryError> {
        for (module, level) in modules {
            let level = Level::from_str(level.trim()).map_err(|_| {
                TelemetryError::InvalidConfig(format!("unknown log level {level:?} for {module}"))
            })?;
            self.module_levels.push((module.trim().to_string(), level));
        }
        Ok(self)
    }

    /// Filter directive equivalent to this config, e.g. `info,planbot_store=debug`.
    pub fn filter_directive(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        })
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        assert_eq!(TelemetryConfig::default().filter_directive(), "info");
    }

    #[test]
    fn module_levels_extend_filter() {
        let config = TelemetryConfig {
            module_levels: vec![("planbot_store".into(), Level::DEBUG)],
            ..Default::default()
        };
        assert_eq!(config.filter_directive(), "info,planbot_store=debug");
    }

    #[test]
    fn module_levels_come_from_settings_pairs() {
        let config = TelemetryConfig::from_names("info", "json")
            .unwrap()
            .with_module_levels([("planbot_store", "debug"), ("tower_http", "WARN")])
            .unwrap();
        assert_eq!(config.filter_directive(), "info,planbot_store=debug,tower_http=warn");

        let err = TelemetryConfig::default()
            .with_module_levels([("planbot_store", "chatty")])
            .unwrap_err();
        assert!(err.to_string().contains("planbot_store"));
    }

    #[test]
    fn from_names_parses_settings_values() {
        let config = TelemetryConfig::from_names("warn", "Pretty").unwrap();
        assert_eq!(config.log_level, Level::WARN);
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn from_names_rejects_unknown_values() {
        assert!(TelemetryConfig::from_names("loud", "json").is_err());
        assert!(TelemetryConfig::from_names("info", "xml").is_err());
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = TelemetryConfig::default();
        let _ = init_telemetry(&config);
        assert!(init_telemetry(&config).is_err());
    }
}
