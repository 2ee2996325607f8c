//! Prompt dialogs
//!
//! A prompt is a leaf dialog that captures one validated piece of user
//! input. It renders its question, waits, validates what comes back, and
//! either ends with the parsed value or renders a retry and waits again.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::models::Activity;
use crate::state::TurnContext;
use crate::utils::errors::{AgentBuddyError, Result};
use super::instance::{DialogAction, DialogInstance};
use super::registry::Dialog;

const OPTIONS_KEY: &str = "options";
const PHASE_KEY: &str = "phase";
const ATTEMPTS_KEY: &str = "attempts";
const RENDERING_KEY: &str = "rendering";

const AFFIRMATIVE: &[&str] = &["yes", "y", "yep", "yeah", "sure", "ok", "okay", "true"];
const NEGATIVE: &[&str] = &["no", "n", "nope", "nah", "false"];

const TOO_MANY_ATTEMPTS: &str = "Sorry, that didn't work out. Let's try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptKind {
    Text,
    Confirm,
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptPhase {
    Prompting,
    AwaitingInput,
    Validating,
    Complete,
}

/// Extra checks for text prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Sent instead of the default retry text when validation fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<PromptValidation>,
    /// Invalid inputs tolerated before giving up; overrides the dialog default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl PromptOptions {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_retry_prompt(mut self, retry_prompt: impl Into<String>) -> Self {
        self.retry_prompt = Some(retry_prompt.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validation(mut self, validation: PromptValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    fn from_value(options: Value) -> Result<Self> {
        let options: Self = match options {
            Value::Null => Self::default(),
            Value::String(prompt) => Self::new(prompt),
            other => serde_json::from_value(other)?,
        };
        if options.max_attempts == Some(0) {
            return Err(AgentBuddyError::Config(
                "Prompt max attempts must be greater than 0 when set".to_string(),
            ));
        }
        Ok(options)
    }
}

/// Parse a yes/no answer, ignoring case and surrounding whitespace
pub fn parse_confirm(input: &str) -> Option<bool> {
    let token = input.trim().to_lowercase();
    if AFFIRMATIVE.contains(&token.as_str()) {
        Some(true)
    } else if NEGATIVE.contains(&token.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Index and text of the choice `input` names, compared case-insensitively
pub fn parse_choice<'c>(input: &str, choices: &'c [String]) -> Option<(usize, &'c str)> {
    let input = input.trim().to_lowercase();
    choices
        .iter()
        .enumerate()
        .find(|(_, choice)| choice.to_lowercase() == input)
        .map(|(index, choice)| (index, choice.as_str()))
}

/// A single-shot input prompt
#[derive(Debug, Clone)]
pub struct PromptDialog {
    id: String,
    kind: PromptKind,
    max_attempts: Option<u32>,
}

impl PromptDialog {
    pub fn new(id: impl Into<String>, kind: PromptKind) -> Self {
        Self {
            id: id.into(),
            kind,
            max_attempts: None,
        }
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::new(id, PromptKind::Text)
    }

    pub fn confirm(id: impl Into<String>) -> Self {
        Self::new(id, PromptKind::Confirm)
    }

    pub fn choice(id: impl Into<String>) -> Self {
        Self::new(id, PromptKind::Choice)
    }

    /// Default cap for prompts whose options do not set one; `None` retries forever
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    /// Validate raw input, yielding the parsed value or `InvalidInput` with retry text
    pub fn recognize(&self, input: &str, options: &PromptOptions) -> Result<Value> {
        match self.kind {
            PromptKind::Text => validate_text(input, options.validation.as_ref()),
            PromptKind::Confirm => parse_confirm(input)
                .map(Value::Bool)
                .ok_or_else(|| AgentBuddyError::InvalidInput("Please answer yes or no.".to_string())),
            PromptKind::Choice => parse_choice(input, &options.choices)
                .map(|(index, value)| json!({ "value": value, "index": index }))
                .ok_or_else(|| {
                    AgentBuddyError::InvalidInput(format!(
                        "Please choose one of: {}.",
                        options.choices.join(", ")
                    ))
                }),
        }
    }

    fn render(&self, text: &str, options: &PromptOptions) -> Activity {
        let activity = Activity::message(text);
        match self.kind {
            PromptKind::Text => activity,
            PromptKind::Confirm => activity.with_suggested_actions(["Yes", "No"]),
            PromptKind::Choice => activity.with_suggested_actions(options.choices.iter().cloned()),
        }
    }

    async fn send_prompt(&self, turn: &mut TurnContext, instance: &mut DialogInstance, options: &PromptOptions) -> Result<()> {
        self.render_and_await(turn, instance, &options.prompt, options).await
    }

    /// Render `text` and move to `AwaitingInput`.
    ///
    /// Until the send succeeds the instance stays in `Prompting` with the
    /// text kept, so a failed send is rendered again on the next turn.
    async fn render_and_await(
        &self,
        turn: &mut TurnContext,
        instance: &mut DialogInstance,
        text: &str,
        options: &PromptOptions,
    ) -> Result<()> {
        instance.set(PHASE_KEY, PromptPhase::Prompting)?;
        instance.set(RENDERING_KEY, text)?;
        if !text.is_empty() {
            turn.send_activity(self.render(text, options)).await?;
        }
        instance.remove(RENDERING_KEY);
        instance.set(PHASE_KEY, PromptPhase::AwaitingInput)?;
        Ok(())
    }

    fn load_options(&self, instance: &DialogInstance) -> Result<PromptOptions> {
        match instance.get_value(OPTIONS_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(PromptOptions::default()),
        }
    }
}

fn validate_text(input: &str, validation: Option<&PromptValidation>) -> Result<Value> {
    let text = input.trim();
    if text.is_empty() {
        return Err(AgentBuddyError::InvalidInput("Please enter a value.".to_string()));
    }

    if let Some(rules) = validation {
        let length = text.chars().count();
        if let Some(min) = rules.min_length {
            if length < min {
                return Err(AgentBuddyError::InvalidInput(format!("Please enter at least {} characters.", min)));
            }
        }
        if let Some(max) = rules.max_length {
            if length > max {
                return Err(AgentBuddyError::InvalidInput(format!("Please enter at most {} characters.", max)));
            }
        }
        if let Some(pattern) = &rules.pattern {
            let regex = Regex::new(pattern)
                .map_err(|e| AgentBuddyError::Config(format!("Invalid prompt pattern {}: {}", pattern, e)))?;
            if !regex.is_match(text) {
                return Err(AgentBuddyError::InvalidInput("That doesn't look right, please try again.".to_string()));
            }
        }
    }

    Ok(Value::String(text.to_string()))
}

#[async_trait]
impl Dialog for PromptDialog {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, turn: &mut TurnContext, instance: &mut DialogInstance, options: Value) -> Result<DialogAction> {
        let options = PromptOptions::from_value(options)?;
        instance.set(OPTIONS_KEY, &options)?;
        instance.set(ATTEMPTS_KEY, 0u32)?;
        self.send_prompt(turn, instance, &options).await?;
        Ok(DialogAction::Wait)
    }

    async fn continue_dialog(&self, turn: &mut TurnContext, instance: &mut DialogInstance) -> Result<DialogAction> {
        let options = self.load_options(instance)?;

        let phase = instance.get::<PromptPhase>(PHASE_KEY).unwrap_or(PromptPhase::AwaitingInput);
        match phase {
            // The last render never reached the user; show it before reading input
            PromptPhase::Prompting => {
                let text = instance.get::<String>(RENDERING_KEY).unwrap_or_else(|| options.prompt.clone());
                debug!(dialog_id = %self.id, "Re-rendering interrupted prompt");
                self.render_and_await(turn, instance, &text, &options).await?;
                return Ok(DialogAction::Wait);
            }
            // A give-up notice failed to send; the new input is judged afresh
            PromptPhase::Validating | PromptPhase::AwaitingInput => {}
            PromptPhase::Complete => {
                return Err(AgentBuddyError::InvalidStateTransition {
                    from: format!("{:?}", phase),
                    to: format!("{:?}", PromptPhase::Validating),
                });
            }
        }

        // Anything but a message gets the question again, without counting an attempt
        if !turn.activity.is_message() {
            debug!(dialog_id = %self.id, activity_type = %turn.activity.activity_type, "Re-prompting after non-message activity");
            self.send_prompt(turn, instance, &options).await?;
            return Ok(DialogAction::Wait);
        }

        instance.set(PHASE_KEY, PromptPhase::Validating)?;
        let input = turn.activity.text.clone();
        match self.recognize(&input, &options) {
            Ok(value) => {
                instance.set(PHASE_KEY, PromptPhase::Complete)?;
                Ok(DialogAction::End(value))
            }
            Err(AgentBuddyError::InvalidInput(reason)) => {
                let attempts = instance.get::<u32>(ATTEMPTS_KEY).unwrap_or(0) + 1;
                instance.set(ATTEMPTS_KEY, attempts)?;

                let cap = options.max_attempts.or(self.max_attempts);
                if cap.is_some_and(|cap| attempts >= cap) {
                    info!(dialog_id = %self.id, attempts = attempts, "Prompt gave up after too many attempts");
                    turn.send_text(TOO_MANY_ATTEMPTS).await?;
                    instance.set(PHASE_KEY, PromptPhase::Complete)?;
                    return Ok(DialogAction::End(Value::Null));
                }

                let retry = options
                    .validation
                    .as_ref()
                    .and_then(|v| v.error_message.clone())
                    .or_else(|| options.retry_prompt.clone())
                    .unwrap_or(reason);
                debug!(dialog_id = %self.id, attempts = attempts, "Prompt input rejected");

                self.render_and_await(turn, instance, &retry, &options).await?;
                Ok(DialogAction::Wait)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use tokio_util::sync::CancellationToken;

    use crate::channels::RecordingAdapter;
    use crate::models::{ActivityType, ChannelAccount};
    use crate::state::{ConversationState, UserState};

    fn turn(activity_type: ActivityType, text: &str, adapter: Arc<RecordingAdapter>) -> TurnContext {
        let activity = Activity::inbound(
            activity_type,
            "test",
            "c1",
            ChannelAccount::new("u1", None),
            ChannelAccount::new("bot", None),
        )
        .with_text(text);
        TurnContext::new(activity, ConversationState::default(), UserState::default(), adapter, CancellationToken::new())
    }

    async fn begin(prompt: &PromptDialog, options: PromptOptions, adapter: &Arc<RecordingAdapter>) -> DialogInstance {
        let mut instance = DialogInstance::new(prompt.id());
        let mut t = turn(ActivityType::Message, "", adapter.clone());
        let action = prompt.begin(&mut t, &mut instance, serde_json::to_value(options).unwrap()).await.unwrap();
        assert_eq!(action, DialogAction::Wait);
        instance
    }

    async fn answer(prompt: &PromptDialog, instance: &mut DialogInstance, text: &str, adapter: &Arc<RecordingAdapter>) -> DialogAction {
        let mut t = turn(ActivityType::Message, text, adapter.clone());
        prompt.continue_dialog(&mut t, instance).await.unwrap()
    }

    #[tokio::test]
    async fn test_confirm_renders_yes_no_and_parses() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt");
        let mut instance = begin(&prompt, PromptOptions::new("Accept?"), &adapter).await;

        let rendered = adapter.last().unwrap();
        assert_eq!(rendered.text, "Accept?");
        assert_eq!(rendered.suggested_actions, vec!["Yes", "No"]);
        assert_eq!(instance.get::<PromptPhase>(PHASE_KEY), Some(PromptPhase::AwaitingInput));

        assert_eq!(answer(&prompt, &mut instance, "YES", &adapter).await, DialogAction::End(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_invalid_confirm_retries_exactly_once() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt");
        let mut instance = begin(&prompt, PromptOptions::new("Accept?"), &adapter).await;
        adapter.clear();

        assert_eq!(answer(&prompt, &mut instance, "maybe", &adapter).await, DialogAction::Wait);
        assert_eq!(adapter.texts(), vec!["Please answer yes or no."]);
        assert_eq!(instance.get::<u32>(ATTEMPTS_KEY), Some(1));

        assert_eq!(answer(&prompt, &mut instance, "n", &adapter).await, DialogAction::End(Value::Bool(false)));
        assert_eq!(adapter.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_non_message_reprompts_without_counting() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::text("text-prompt");
        let mut instance = begin(&prompt, PromptOptions::new("Name?"), &adapter).await;
        adapter.clear();

        let mut t = turn(ActivityType::ConversationUpdate, "", adapter.clone());
        assert_eq!(prompt.continue_dialog(&mut t, &mut instance).await.unwrap(), DialogAction::Wait);
        assert_eq!(adapter.texts(), vec!["Name?"]);
        assert_eq!(instance.get::<u32>(ATTEMPTS_KEY), Some(0));
    }

    #[tokio::test]
    async fn test_choice_matches_case_insensitively() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::choice("credential-type-prompt");
        let options = PromptOptions::new("Which?").with_choices(["Email", "Phone", "Twitter"]);
        let mut instance = begin(&prompt, options, &adapter).await;
        assert_eq!(adapter.last().unwrap().suggested_actions, vec!["Email", "Phone", "Twitter"]);

        assert_eq!(answer(&prompt, &mut instance, "fax", &adapter).await, DialogAction::Wait);
        assert_eq!(
            answer(&prompt, &mut instance, "phone", &adapter).await,
            DialogAction::End(json!({"value": "Phone", "index": 1}))
        );
    }

    #[tokio::test]
    async fn test_text_validation_uses_custom_message() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::text("text-prompt");
        let options = PromptOptions::new("Code?").with_validation(PromptValidation {
            pattern: Some(r"^\d{4}$".to_string()),
            error_message: Some("Four digits please".to_string()),
            ..Default::default()
        });
        let mut instance = begin(&prompt, options, &adapter).await;

        assert_eq!(answer(&prompt, &mut instance, "12a4", &adapter).await, DialogAction::Wait);
        assert_eq!(adapter.last().unwrap().text, "Four digits please");
        assert_eq!(answer(&prompt, &mut instance, " 1234 ", &adapter).await, DialogAction::End(json!("1234")));
    }

    #[tokio::test]
    async fn test_attempt_cap_ends_with_null() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt").with_max_attempts(Some(2));
        let mut instance = begin(&prompt, PromptOptions::new("Accept?"), &adapter).await;

        assert_eq!(answer(&prompt, &mut instance, "what", &adapter).await, DialogAction::Wait);
        assert_eq!(answer(&prompt, &mut instance, "huh", &adapter).await, DialogAction::End(Value::Null));
        assert_eq!(adapter.last().unwrap().text, TOO_MANY_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_unbounded_by_default() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt");
        let mut instance = begin(&prompt, PromptOptions::new("Accept?"), &adapter).await;
        for _ in 0..20 {
            assert_eq!(answer(&prompt, &mut instance, "?", &adapter).await, DialogAction::Wait);
        }
        assert_eq!(instance.get::<u32>(ATTEMPTS_KEY), Some(20));
    }

    #[tokio::test]
    async fn test_failed_retry_is_rendered_on_next_turn() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt");
        let mut instance = begin(&prompt, PromptOptions::new("Accept?"), &adapter).await;
        adapter.clear();

        adapter.fail_next(1);
        let mut t = turn(ActivityType::Message, "maybe", adapter.clone());
        assert_matches!(prompt.continue_dialog(&mut t, &mut instance).await, Err(AgentBuddyError::Channel(_)));
        assert_eq!(instance.get::<PromptPhase>(PHASE_KEY), Some(PromptPhase::Prompting));

        // The input of the recovering turn only brings the retry text back
        assert_eq!(answer(&prompt, &mut instance, "yes", &adapter).await, DialogAction::Wait);
        assert_eq!(adapter.texts(), vec!["Please answer yes or no."]);
        assert_eq!(adapter.last().unwrap().suggested_actions, vec!["Yes", "No"]);
        assert_eq!(instance.get::<PromptPhase>(PHASE_KEY), Some(PromptPhase::AwaitingInput));
        assert_eq!(instance.get_value(RENDERING_KEY), None);

        assert_eq!(answer(&prompt, &mut instance, "yes", &adapter).await, DialogAction::End(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_failed_give_up_notice_judges_next_input() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt").with_max_attempts(Some(1));
        let mut instance = begin(&prompt, PromptOptions::new("Accept?"), &adapter).await;

        adapter.fail_next(1);
        let mut t = turn(ActivityType::Message, "what", adapter.clone());
        assert_matches!(prompt.continue_dialog(&mut t, &mut instance).await, Err(AgentBuddyError::Channel(_)));
        assert_eq!(instance.get::<PromptPhase>(PHASE_KEY), Some(PromptPhase::Validating));

        assert_eq!(answer(&prompt, &mut instance, "no", &adapter).await, DialogAction::End(Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_completed_prompt_rejects_input() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::text("text-prompt");
        let mut instance = begin(&prompt, PromptOptions::new("Name?"), &adapter).await;
        instance.set(PHASE_KEY, PromptPhase::Complete).unwrap();

        let mut t = turn(ActivityType::Message, "Ann", adapter.clone());
        assert_matches!(
            prompt.continue_dialog(&mut t, &mut instance).await,
            Err(AgentBuddyError::InvalidStateTransition { .. })
        );
    }

    #[tokio::test]
    async fn test_zero_attempt_cap_is_rejected() {
        let adapter = Arc::new(RecordingAdapter::new());
        let prompt = PromptDialog::confirm("yes-no-prompt");
        let mut instance = DialogInstance::new(prompt.id());
        let mut t = turn(ActivityType::Message, "", adapter.clone());
        let options = serde_json::to_value(PromptOptions::new("Accept?").with_max_attempts(0)).unwrap();

        assert_matches!(
            prompt.begin(&mut t, &mut instance, options).await,
            Err(AgentBuddyError::Config(msg)) if msg.contains("max attempts")
        );
        assert!(adapter.texts().is_empty());
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let prompt = PromptDialog::text("text-prompt");
        let options = PromptOptions::new("x").with_validation(PromptValidation {
            pattern: Some("(".to_string()),
            ..Default::default()
        });
        assert_matches!(prompt.recognize("abc", &options), Err(AgentBuddyError::Config(_)));
    }

    #[test]
    fn test_string_options_become_prompt_text() {
        let options = PromptOptions::from_value(json!("Hello?")).unwrap();
        assert_eq!(options.prompt, "Hello?");
    }

    proptest! {
        #[test]
        fn prop_confirm_tokens_ignore_case(idx in 0usize..8, upper in proptest::collection::vec(any::<bool>(), 8)) {
            let token: String = AFFIRMATIVE[idx]
                .chars()
                .zip(upper.iter().cycle())
                .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
                .collect();
            prop_assert_eq!(parse_confirm(&token), Some(true));
        }

        #[test]
        fn prop_unknown_tokens_are_rejected(input in "[a-z]{6,12}") {
            prop_assume!(!AFFIRMATIVE.contains(&input.as_str()) && !NEGATIVE.contains(&input.as_str()));
            prop_assert_eq!(parse_confirm(&input), None);
        }
    }
}
