//! Configuration validation module
//! 
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{AgentBuddyError, Result};
use super::{Settings, StorageBackend};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    if settings.storage.backend == StorageBackend::Redis {
        validate_redis_config(&settings.redis)?;
    }
    validate_agent_config(&settings.agent)?;
    validate_events_config(&settings.events)?;
    validate_dialogs_config(&settings.dialogs)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(AgentBuddyError::Config(
            "Bot token is required".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AgentBuddyError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

/// Validate agent sidecar configuration
fn validate_agent_config(config: &super::AgentConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(AgentBuddyError::Config(
            "Agent API URL is required".to_string()
        ));
    }

    if url::Url::parse(&config.endpoint_host).is_err() {
        return Err(AgentBuddyError::Config(
            format!("Agent endpoint host is not an absolute URL: {}", config.endpoint_host)
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(AgentBuddyError::Config(
            "Agent timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate event bus configuration
fn validate_events_config(config: &super::EventsConfig) -> Result<()> {
    if config.replay_window_seconds == 0 {
        return Err(AgentBuddyError::Config(
            "Replay window must be greater than 0".to_string()
        ));
    }

    if config.prune_interval_seconds == 0 {
        return Err(AgentBuddyError::Config(
            "Prune interval must be greater than 0".to_string()
        ));
    }

    if config.poll_interval_seconds == 0 {
        return Err(AgentBuddyError::Config(
            "Poll interval must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate dialog engine configuration
fn validate_dialogs_config(config: &super::DialogsConfig) -> Result<()> {
    if config.max_prompt_attempts == Some(0) {
        return Err(AgentBuddyError::Config(
            "Max prompt attempts must be greater than 0 when set".to_string()
        ));
    }

    // Intents must score strictly above the threshold, and scores top out at 1
    if !(0.0..1.0).contains(&config.intent_threshold) {
        return Err(AgentBuddyError::Config(
            format!("Intent threshold must be within 0..1, got {}", config.intent_threshold)
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(AgentBuddyError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(AgentBuddyError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "123:abc".to_string();
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let settings = Settings::default();
        assert_matches!(validate_settings(&settings), Err(AgentBuddyError::Config(_)));
    }

    #[test]
    fn test_zero_prompt_cap_rejected() {
        let mut settings = valid_settings();
        settings.dialogs.max_prompt_attempts = Some(0);
        assert_matches!(validate_settings(&settings), Err(AgentBuddyError::Config(_)));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut settings = valid_settings();
        settings.events.poll_interval_seconds = 0;
        assert_matches!(
            validate_settings(&settings),
            Err(AgentBuddyError::Config(msg)) if msg.contains("Poll interval")
        );
    }

    #[test]
    fn test_intent_threshold_must_stay_below_one() {
        let mut settings = valid_settings();
        settings.dialogs.intent_threshold = 1.0;
        assert_matches!(
            validate_settings(&settings),
            Err(AgentBuddyError::Config(msg)) if msg.contains("Intent threshold")
        );

        settings.dialogs.intent_threshold = 0.0;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_redis_url_only_checked_for_redis_backend() {
        let mut settings = valid_settings();
        settings.redis.url.clear();
        assert!(validate_settings(&settings).is_ok());

        settings.storage.backend = StorageBackend::Redis;
        assert_matches!(validate_settings(&settings), Err(AgentBuddyError::Config(_)));
    }
}
