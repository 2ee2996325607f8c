//! Application settings management
//! 
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub redis: RedisConfig,
    pub agent: AgentConfig,
    pub events: EventsConfig,
    pub dialogs: DialogsConfig,
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    /// Identity the bot uses as `recipient` on inbound activities
    pub app_id: String,
}

/// Which state store backs conversation and user state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Redis,
}

/// State storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    /// 0 keeps state for the life of the conversation
    pub ttl_seconds: u64,
}

/// Agent sidecar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub api_url: String,
    pub endpoint_host: String,
    pub wallet_key: String,
    pub timeout_seconds: u64,
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub replay_window_seconds: u64,
    pub prune_interval_seconds: u64,
    /// How often the agent's event feed is polled
    pub poll_interval_seconds: u64,
}

/// Dialog engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DialogsConfig {
    /// Absent means prompts retry forever
    pub max_prompt_attempts: Option<u32>,
    pub intent_threshold: f64,
    pub serialize_turns: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("AGENTBUDDY").separator("__").try_parsing(true))
            .build()?;

        let mut settings: Settings = settings.try_deserialize()?;
        if settings.bot.app_id.is_empty() {
            settings.bot.app_id = "1".to_string();
        }
        Ok(settings)
    }

    /// Load settings from an explicit file, still honouring environment overrides
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("AGENTBUDDY").separator("__").try_parsing(true))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::AgentBuddyError> {
        super::validation::validate_settings(self)
    }
}

impl EventsConfig {
    pub fn replay_window(&self) -> Duration {
        Duration::from_secs(self.replay_window_seconds)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            app_id: "1".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::Memory }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "agentbuddy:".to_string(),
            ttl_seconds: 0,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000".to_string(),
            endpoint_host: "http://localhost:5000".to_string(),
            wallet_key: "DefaultKey".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            replay_window_seconds: 300,
            prune_interval_seconds: 60,
            poll_interval_seconds: 5,
        }
    }
}

impl Default for DialogsConfig {
    fn default() -> Self {
        Self {
            max_prompt_attempts: None,
            intent_threshold: 0.7,
            serialize_turns: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: "logs".to_string(),
        }
    }
}
