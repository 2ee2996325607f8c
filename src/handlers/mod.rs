//! Bot handlers module
//!
//! This module contains the turn handler that routes every inbound
//! activity, the intent recognition seam, and the application dialogs.

pub mod dialogs;
pub mod recognizer;

pub use recognizer::{CommandRecognizer, IntentRecognizer, RecognizerResult};

use std::sync::Arc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::channels::ChannelAdapter;
use crate::config::Settings;
use crate::dialogs::{DialogRegistry, DialogTurnResult};
use crate::models::{Activity, ActivityType};
use crate::services::ServiceFactory;
use crate::state::{StateAccessors, TurnContext};
use crate::utils::errors::Result;
use crate::utils::logging::log_turn;
use dialogs::{ACCEPT_INVITATION, CREATE_INVITATION, ISSUE_CREDENTIAL, PROVISION_AGENT};
use recognizer::{ENTITY_CREDENTIAL_TYPE, INTENT_CREATE_INVITATION, INTENT_ISSUE_CREDENTIAL, INTENT_PROVISION};

/// The whole message, when it is an absolute URI with a host.
///
/// Hostless absolute URIs such as `mailto:` or `urn:` stay plain text;
/// an invitation always points at an agent endpoint.
pub fn invitation_uri(text: &str) -> Option<&str> {
    let text = text.trim();
    let url = url::Url::parse(text).ok()?;
    url.host().map(|_| text)
}

/// Routes inbound activities through the dialog engine
pub struct AgentBot {
    registry: DialogRegistry,
    accessors: StateAccessors,
    recognizer: Arc<dyn IntentRecognizer>,
    adapter: Arc<dyn ChannelAdapter>,
    intent_threshold: f64,
}

impl AgentBot {
    pub fn new(
        settings: &Settings,
        services: &ServiceFactory,
        adapter: Arc<dyn ChannelAdapter>,
        recognizer: Arc<dyn IntentRecognizer>,
    ) -> Self {
        let registry = dialogs::build_registry(
            settings,
            services.agent_service.clone(),
            services.resumer.clone(),
        );
        Self {
            registry,
            accessors: services.accessors.clone(),
            recognizer,
            adapter,
            intent_threshold: settings.dialogs.intent_threshold,
        }
    }

    pub fn registry(&self) -> &DialogRegistry {
        &self.registry
    }

    pub fn accessors(&self) -> &StateAccessors {
        &self.accessors
    }

    /// Process one inbound activity.
    ///
    /// State is loaded, dispatched on and saved once, even when dispatch
    /// fails; the dispatch error is then returned.
    pub async fn on_turn(&self, activity: Activity, cancel: CancellationToken) -> Result<DialogTurnResult> {
        let reference = activity.conversation_reference();
        let _guard = self.accessors.lock(&reference).await;

        let mut turn = self
            .accessors
            .begin_turn(activity, self.adapter.clone(), cancel)
            .await?;
        log_turn(
            &turn.reference.conversation_id,
            turn.activity.activity_type.as_str(),
            Some(turn.activity.text.as_str()).filter(|t| !t.is_empty()),
        );

        let outcome = self.dispatch(&mut turn).await;
        let saved = self.accessors.save(&turn).await;

        if let Err(e) = &outcome {
            error!(
                conversation_id = %turn.reference.conversation_id,
                error = %e,
                severity = %e.severity(),
                "Turn failed"
            );
        }
        let result = outcome?;
        saved?;
        Ok(result)
    }

    async fn dispatch(&self, turn: &mut TurnContext) -> Result<DialogTurnResult> {
        match turn.activity.activity_type.clone() {
            ActivityType::Message => self.on_message(turn).await,
            ActivityType::ConversationUpdate => {
                self.on_conversation_update(turn).await?;
                Ok(DialogTurnResult::Empty)
            }
            other => {
                let text = format!("{} event detected", other);
                turn.send_text(text).await?;
                Ok(DialogTurnResult::Empty)
            }
        }
    }

    async fn on_message(&self, turn: &mut TurnContext) -> Result<DialogTurnResult> {
        turn.user_state.record_turn();
        let text = turn.activity.text.clone();

        let mut dc = self.registry.create_context(turn);
        let result = dc.continue_dialog().await?;
        if result != DialogTurnResult::Empty {
            return Ok(result);
        }

        if let Some(uri) = invitation_uri(&text) {
            debug!(uri = uri, "Message is a link, treating it as an invitation");
            return dc.begin_dialog(ACCEPT_INVITATION, Value::String(uri.to_string())).await;
        }

        let recognized = self.recognizer.recognize(&text).await?;
        if recognized.score > self.intent_threshold {
            return match recognized.intent.as_str() {
                INTENT_PROVISION => dc.begin_dialog(PROVISION_AGENT, Value::Null).await,
                INTENT_CREATE_INVITATION => dc.begin_dialog(CREATE_INVITATION, Value::Null).await,
                INTENT_ISSUE_CREDENTIAL => {
                    let options = recognized
                        .entity(ENTITY_CREDENTIAL_TYPE)
                        .map(|kind| Value::String(kind.to_string()))
                        .unwrap_or(Value::Null);
                    dc.begin_dialog(ISSUE_CREDENTIAL, options).await
                }
                other => {
                    dc.turn()
                        .send_text(format!("I can't process this intent yet ({})", other))
                        .await?;
                    Ok(DialogTurnResult::Empty)
                }
            };
        }

        let turn = dc.turn();
        let state = &mut turn.conversation_state.application_state;
        state.turn_count += 1;
        let reply = format!("Turn {}: You sent '{}'", state.turn_count, text);
        turn.send_text(reply).await?;
        Ok(DialogTurnResult::Empty)
    }

    async fn on_conversation_update(&self, turn: &mut TurnContext) -> Result<()> {
        let bot_id = turn.activity.recipient.id.clone();
        let greetings = turn
            .activity
            .members_added
            .iter()
            .filter(|member| member.id == bot_id)
            .count();
        for _ in 0..greetings {
            turn.send_text("Hi there!").await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBot")
            .field("registry", &self.registry)
            .field("intent_threshold", &self.intent_threshold)
            .finish_non_exhaustive()
    }
}
