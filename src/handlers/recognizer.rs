//! Intent recognition
//!
//! The bot only needs the top scoring intent and a few named entities, so
//! recognition sits behind a small trait. `CommandRecognizer` is the
//! built-in implementation and understands slash commands.

use std::collections::HashMap;
use async_trait::async_trait;
use tracing::debug;

use crate::utils::errors::Result;

pub const INTENT_PROVISION: &str = "Agent_Provision";
pub const INTENT_CREATE_INVITATION: &str = "Connection_CreateInvitation";
pub const INTENT_ISSUE_CREDENTIAL: &str = "Credential_Issue";
pub const INTENT_NONE: &str = "None";

/// Entity carrying the requested credential type
pub const ENTITY_CREDENTIAL_TYPE: &str = "CredentialType";

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerResult {
    pub intent: String,
    pub score: f64,
    pub entities: HashMap<String, Vec<String>>,
}

impl RecognizerResult {
    pub fn new(intent: impl Into<String>, score: f64) -> Self {
        Self {
            intent: intent.into(),
            score,
            entities: HashMap::new(),
        }
    }

    /// Nothing recognized
    pub fn none() -> Self {
        Self::new(INTENT_NONE, 0.0)
    }

    pub fn with_entity(mut self, name: &str, value: impl Into<String>) -> Self {
        self.entities.entry(name.to_string()).or_default().push(value.into());
        self
    }

    /// First value of a named entity
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).and_then(|values| values.first()).map(String::as_str)
    }
}

#[async_trait]
pub trait IntentRecognizer: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<RecognizerResult>;
}

/// Maps `/provision`, `/invite` and `/issue [type]` onto intents
#[derive(Debug, Clone, Default)]
pub struct CommandRecognizer;

impl CommandRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn parse(text: &str) -> RecognizerResult {
        let mut parts = text.trim().split_whitespace();
        let Some(command) = parts.next().and_then(|c| c.strip_prefix('/')) else {
            return RecognizerResult::none();
        };
        // Telegram appends the bot name in groups: /invite@SomeBot
        let command = command.split('@').next().unwrap_or(command).to_lowercase();
        if command.is_empty() {
            return RecognizerResult::none();
        }

        match command.as_str() {
            "provision" => RecognizerResult::new(INTENT_PROVISION, 1.0),
            "invite" => RecognizerResult::new(INTENT_CREATE_INVITATION, 1.0),
            "issue" => {
                let result = RecognizerResult::new(INTENT_ISSUE_CREDENTIAL, 1.0);
                match parts.next() {
                    Some(kind) => result.with_entity(ENTITY_CREDENTIAL_TYPE, kind),
                    None => result,
                }
            }
            other => RecognizerResult::new(other, 1.0),
        }
    }
}

#[async_trait]
impl IntentRecognizer for CommandRecognizer {
    async fn recognize(&self, text: &str) -> Result<RecognizerResult> {
        let result = Self::parse(text);
        debug!(intent = %result.intent, score = result.score, "Recognized intent");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_commands() {
        let recognizer = CommandRecognizer::new();

        let result = recognizer.recognize("/provision").await.unwrap();
        assert_eq!(result.intent, INTENT_PROVISION);
        assert_eq!(result.score, 1.0);

        let result = recognizer.recognize("/invite@AgentBuddyBot").await.unwrap();
        assert_eq!(result.intent, INTENT_CREATE_INVITATION);
    }

    #[tokio::test]
    async fn test_issue_carries_credential_type() {
        let recognizer = CommandRecognizer::new();

        let result = recognizer.recognize("/issue Email").await.unwrap();
        assert_eq!(result.intent, INTENT_ISSUE_CREDENTIAL);
        assert_eq!(result.entity(ENTITY_CREDENTIAL_TYPE), Some("Email"));

        let result = recognizer.recognize("/issue").await.unwrap();
        assert_eq!(result.entity(ENTITY_CREDENTIAL_TYPE), None);
    }

    #[tokio::test]
    async fn test_plain_text_and_unknown_commands() {
        let recognizer = CommandRecognizer::new();

        let result = recognizer.recognize("hello there").await.unwrap();
        assert_eq!(result.intent, INTENT_NONE);
        assert_eq!(result.score, 0.0);

        let result = recognizer.recognize("/weather").await.unwrap();
        assert_eq!(result.intent, "weather");
        assert_eq!(result.score, 1.0);

        assert_eq!(recognizer.recognize("/").await.unwrap().intent, INTENT_NONE);
    }
}
