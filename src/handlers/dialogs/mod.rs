//! Application dialogs
//!
//! The conversations the bot can hold: provisioning an agent, creating and
//! accepting connection invitations, waiting for a connection to complete,
//! and choosing a credential. Steps shared by several dialogs live here.

pub mod accept_invitation;
pub mod create_invitation;
pub mod issue_credential;
pub mod notify_connected;
pub mod provision_agent;

pub use accept_invitation::AcceptInvitation;
pub use create_invitation::CreateInvitation;
pub use issue_credential::{IssueCredential, CREDENTIAL_TYPES};
pub use notify_connected::NotifyConnected;
pub use provision_agent::ProvisionAgent;

use std::future::Future;
use std::sync::Arc;
use serde_json::Value;

use crate::config::Settings;
use crate::dialogs::{DialogRegistry, PromptDialog, PromptOptions, StepContext, StepDirective, WaterfallDialog};
use crate::services::{AgentService, ConversationResumer};
use crate::state::TurnContext;
use crate::utils::errors::{AgentBuddyError, AgentError, AgentResult, Result};
use crate::utils::logging::log_api_error;

pub const PROVISION_AGENT: &str = "provision-agent";
pub const CREATE_INVITATION: &str = "create-invitation";
pub const ACCEPT_INVITATION: &str = "accept-invitation";
pub const NOTIFY_CONNECTED: &str = "notify-connected";
pub const ISSUE_CREDENTIAL: &str = "issue-credential";
pub const TEXT_PROMPT: &str = "text-prompt";
pub const YES_NO_PROMPT: &str = "yes-no-prompt";
pub const CREDENTIAL_TYPE_PROMPT: &str = "credential-type-prompt";

/// Build the registry with every dialog the bot knows
pub fn build_registry(
    settings: &Settings,
    agent: Arc<dyn AgentService>,
    resumer: Arc<ConversationResumer>,
) -> DialogRegistry {
    let max_attempts = settings.dialogs.max_prompt_attempts;
    let mut registry = DialogRegistry::new();

    registry
        .add(WaterfallDialog::new(
            PROVISION_AGENT,
            ProvisionAgent::new(agent.clone(), settings.agent.clone()),
        ))
        .add(WaterfallDialog::new(CREATE_INVITATION, CreateInvitation::new(agent.clone())))
        .add(WaterfallDialog::new(ACCEPT_INVITATION, AcceptInvitation::new(agent)))
        .add(NotifyConnected::new(NOTIFY_CONNECTED, resumer))
        .add(WaterfallDialog::new(ISSUE_CREDENTIAL, IssueCredential))
        .add(PromptDialog::text(TEXT_PROMPT).with_max_attempts(max_attempts))
        .add(PromptDialog::confirm(YES_NO_PROMPT).with_max_attempts(max_attempts))
        .add(PromptDialog::choice(CREDENTIAL_TYPE_PROMPT).with_max_attempts(max_attempts));

    registry
}

/// Step: offer provisioning when the conversation has no agent yet.
///
/// `purpose` completes "You must provision an agent before ...".
pub(crate) async fn require_agent(ctx: &mut StepContext<'_>, purpose: &str) -> Result<StepDirective> {
    if ctx.turn.conversation_state.application_state.is_provisioned() {
        return StepDirective::next();
    }
    ctx.turn
        .send_text(format!("You must provision an agent before {}", purpose))
        .await?;
    StepDirective::prompt(YES_NO_PROMPT, PromptOptions::new("Would you like to do that now?"))
}

/// Step following `require_agent`: a null result means no question was asked
pub(crate) async fn provision_if_accepted(ctx: &mut StepContext<'_>) -> Result<StepDirective> {
    match ctx.result() {
        Value::Null => StepDirective::next(),
        Value::Bool(true) => StepDirective::begin(PROVISION_AGENT, Value::Null),
        _ => {
            ctx.turn.send_text("Ok").await?;
            StepDirective::end(false)
        }
    }
}

/// Await an agent call unless the turn is cancelled first.
///
/// Cancellation is returned as the outer error; the agent's own failure is
/// left for the step to report.
pub(crate) async fn call_agent<T, F>(turn: &TurnContext, call: F) -> Result<AgentResult<T>>
where
    F: Future<Output = AgentResult<T>>,
{
    turn.run_cancellable(async { Ok(call.await) }).await
}

/// Tell the user an agent call failed and end the dialog with `false`
pub(crate) async fn report_agent_failure(
    turn: &mut TurnContext,
    operation: &str,
    apology: &str,
    error: &AgentError,
) -> Result<StepDirective> {
    log_api_error(operation, &error.to_string(), Some(&turn.conversation_key()));
    turn.send_text(apology).await?;
    turn.send_text(format!("Error: {}", error)).await?;
    StepDirective::end(false)
}

pub(crate) fn unknown_step(dialog_id: &str, step: &str) -> AgentBuddyError {
    AgentBuddyError::Config(format!("Dialog '{}' has no step named '{}'", dialog_id, step))
}
