//! Configuration loading and management for boltwatch.
//!
//! Loads settings from `boltwatch.toml` with environment variable overrides for sensitive data.
//! Every key is optional; absent keys fall back to their defaults.

use crate::scraper::SelectorTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

const CONFIG_FILE: &str = "boltwatch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("failed to write config: {0}")]
    WriteError(#[from] toml::ser::Error),
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// User settings, read before each pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// LLM provider: "anthropic", "gemini" or "openai"
    pub api_provider: String,
    pub anthropic_api_key: String,
    pub gemini_api_key: String,
    pub openai_api_key: String,
    /// Discord webhook that receives notifications
    pub discord_webhook_url: String,
    /// Switch the page into discuss mode after each completed task
    pub auto_discuss_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_provider: "anthropic".to_string(),
            anthropic_api_key: String::new(),
            gemini_api_key: String::new(),
            openai_api_key: String::new(),
            discord_webhook_url: String::new(),
            auto_discuss_mode: false,
        }
    }
}

impl Settings {
    /// Get the API key for the selected provider, if it is set
    pub fn selected_api_key(&self) -> Option<&str> {
        let key = match self.api_provider.as_str() {
            "anthropic" => &self.anthropic_api_key,
            "gemini" => &self.gemini_api_key,
            "openai" => &self.openai_api_key,
            _ => return None,
        };
        (!key.is_empty()).then_some(key.as_str())
    }

    /// Check whether any provider has a key
    pub fn has_any_api_key(&self) -> bool {
        !self.anthropic_api_key.is_empty()
            || !self.gemini_api_key.is_empty()
            || !self.openai_api_key.is_empty()
    }

    /// Check that the webhook URL and the selected provider's key are present
    pub fn validate(&self) -> bool {
        !self.discord_webhook_url.is_empty() && self.selected_api_key().is_some()
    }

    /// Update a single setting by its persisted key name
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "apiProvider" => match value {
                "anthropic" | "gemini" | "openai" => self.api_provider = value.to_string(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                }
            },
            "anthropicApiKey" => self.anthropic_api_key = value.to_string(),
            "geminiApiKey" => self.gemini_api_key = value.to_string(),
            "openaiApiKey" => self.openai_api_key = value.to_string(),
            "discordWebhookUrl" => self.discord_webhook_url = value.to_string(),
            "autoDiscussMode" => {
                self.auto_discuss_mode = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Override API keys and webhook from environment variables
    fn apply_env(&mut self) {
        let overrides = [
            ("ANTHROPIC_API_KEY", &mut self.anthropic_api_key),
            ("GEMINI_API_KEY", &mut self.gemini_api_key),
            ("OPENAI_API_KEY", &mut self.openai_api_key),
            ("DISCORD_WEBHOOK_URL", &mut self.discord_webhook_url),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                *field = value;
            }
        }
    }
}

/// Polling and timing configuration for the watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// How often the page source is polled
    pub poll_interval_ms: u64,
    /// Delay after a completion before the page is extracted
    pub settle_delay_ms: u64,
    /// Delay after a run before the detector is armed again
    pub cooldown_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            settle_delay_ms: 500,
            cooldown_ms: 2000,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub settings: Settings,
    #[serde(default)]
    pub selectors: SelectorTable,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Config {
    /// Load configuration from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.settings.apply_env();
        Ok(config)
    }

    /// Load the file without environment overrides
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Persist the configuration, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Find the config file in standard locations
    pub fn find_config_file() -> PathBuf {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return local_config;
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config").join("boltwatch").join(CONFIG_FILE);
            if home_config.exists() {
                return home_config;
            }
        }

        // Default to local path (load yields defaults, save creates it)
        local_config
    }
}

/// Settings handle that re-reads the config file on every access, so saved
/// changes take effect on the next triggered cycle.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    env_overrides: bool,
}

impl ConfigStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_overrides: true,
        }
    }

    /// Read only the file, ignoring `*_API_KEY` and `DISCORD_WEBHOOK_URL`
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current settings. Failures are logged and yield defaults.
    pub fn read(&self) -> Settings {
        let loaded = if self.env_overrides {
            Config::load_from(&self.path)
        } else {
            Config::load_file(&self.path)
        };

        match loaded {
            Ok(config) => config.settings,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "error reading settings");
                let mut settings = Settings::default();
                if self.env_overrides {
                    settings.apply_env();
                }
                settings
            }
        }
    }

    /// Update one persisted setting. Environment overrides are not written back.
    pub fn save_setting(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut config = Config::load_file(&self.path)?;
        config.settings.set(key, value)?;
        config.save_to(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_keys_use_defaults() {
        let config: Config = toml::from_str("discordWebhookUrl = \"https://example.com/hook\"").unwrap();
        assert_eq!(config.settings.api_provider, "anthropic");
        assert_eq!(config.settings.anthropic_api_key, "");
        assert!(!config.settings.auto_discuss_mode);
        assert_eq!(config.settings.discord_webhook_url, "https://example.com/hook");
        assert_eq!(config.watch, WatchConfig::default());
        assert_eq!(config.selectors, SelectorTable::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn selected_key_follows_provider_only() {
        let settings = Settings {
            api_provider: "openai".to_string(),
            anthropic_api_key: "sk-ant".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.selected_api_key(), None);
        assert!(settings.has_any_api_key());
    }

    #[test]
    fn validate_requires_webhook_and_selected_key() {
        let mut settings = Settings {
            gemini_api_key: "AIza".to_string(),
            api_provider: "gemini".to_string(),
            ..Settings::default()
        };
        assert!(!settings.validate());
        settings.discord_webhook_url = "https://discord.com/api/webhooks/1/x".to_string();
        assert!(settings.validate());
        settings.api_provider = "anthropic".to_string();
        assert!(!settings.validate());
    }

    #[test]
    fn set_rejects_unknown_keys_and_values() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set("slackUrl", "x"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("apiProvider", "mistral"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("autoDiscussMode", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        settings.set("autoDiscussMode", "true").unwrap();
        assert!(settings.auto_discuss_mode);
    }

    #[test]
    fn saved_setting_is_read_back() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("nested").join(CONFIG_FILE));

        store.save_setting("apiProvider", "gemini").unwrap();
        store.save_setting("autoDiscussMode", "true").unwrap();

        let config = Config::load_file(store.path()).unwrap();
        assert_eq!(config.settings.api_provider, "gemini");
        assert!(config.settings.auto_discuss_mode);
        assert_eq!(config.watch, WatchConfig::default());
    }

    #[test]
    fn env_overrides_can_be_disabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let store = ConfigStore::at(&path);
        store
            .save_setting("discordWebhookUrl", "https://example.com/from-file")
            .unwrap();

        // No other test in this binary reads DISCORD_WEBHOOK_URL
        std::env::set_var("DISCORD_WEBHOOK_URL", "https://example.com/from-env");
        let with_env = store.read();
        let file_only = ConfigStore::at(&path).without_env_overrides().read();
        std::env::remove_var("DISCORD_WEBHOOK_URL");

        assert_eq!(with_env.discord_webhook_url, "https://example.com/from-env");
        assert_eq!(file_only.discord_webhook_url, "https://example.com/from-file");
    }

    #[test]
    fn watch_table_overrides_timings() {
        let config: Config = toml::from_str("[watch]\ncooldown_ms = 50\n").unwrap();
        assert_eq!(config.watch.cooldown(), Duration::from_millis(50));
        assert_eq!(config.watch.settle_delay(), Duration::from_millis(500));
    }
}
