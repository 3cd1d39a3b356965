//! Configuration and settings management
//!
//! Loads settings from environment variables and `.env` / config files.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub bot_token: String,

    /// Numeric id of the group chat the bot watches
    pub chat_id_nhom: i64,

    /// Numeric id of the private chat reports are relayed to
    pub chat_id_canhan: i64,

    /// Path to the Google Drive authorized-user credential bundle
    #[serde(default = "default_drive_token_path")]
    pub drive_token_path: String,

    /// Path of the persisted session state file
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_drive_token_path() -> String {
    "token_drive.json".to_string()
}

fn default_state_file() -> String {
    "state.json".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required variable is
    /// missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also add settings from environment variables directly (without prefix)
            // Note: Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}
