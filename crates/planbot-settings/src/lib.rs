//! # planbot-settings
//!
//! Settings are resolved from three layers, lowest priority first:
//! 1. compiled defaults ([`PlanbotSettings::default()`])
//! 2. an optional JSON file, deep-merged over the defaults
//! 3. environment variables (`BOT_TOKEN`, `PORT`, `RENDER_EXTERNAL_URL`,
//!    `PLANBOT_*`)
//!
//! The loaded value is built once in `main` and handed to the components
//! that need it; there is no global settings cache.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, settings_path};
pub use types::*;
