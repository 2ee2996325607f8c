//! Invitation acceptance dialog

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::dialogs::{PromptOptions, StepContext, StepDirective, Waterfall};
use crate::events::MessageKind;
use crate::models::{ConnectionInvitationMessage, CONNECTION_INVITATION_TYPE};
use crate::services::{AgentService, NotifyRequest};
use crate::utils::errors::Result;
use crate::utils::invitation::{decode_invitation, invitation_type};
use super::{
    call_agent, provision_if_accepted, report_agent_failure, require_agent, unknown_step,
    ACCEPT_INVITATION, NOTIFY_CONNECTED, YES_NO_PROMPT,
};

const UNSPECIFIED: &str = "[unspecified]";

/// Label to show for a decoded invitation payload
pub fn invitation_label(payload: &Value) -> &str {
    if invitation_type(payload) != Some(CONNECTION_INVITATION_TYPE) {
        return UNSPECIFIED;
    }
    payload.get("label").and_then(Value::as_str).unwrap_or(UNSPECIFIED)
}

/// Accepts a connection invitation link the user pasted.
///
/// Begun with the link as its options. Confirms with the user, makes sure
/// an agent exists, sends the connection request and waits for the
/// response in the background.
pub struct AcceptInvitation {
    agent: Arc<dyn AgentService>,
}

impl AcceptInvitation {
    pub fn new(agent: Arc<dyn AgentService>) -> Self {
        Self { agent }
    }

    fn decode(ctx: &StepContext<'_>) -> Option<Value> {
        let uri = ctx.options().as_str()?;
        match decode_invitation(uri) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(
                    conversation_id = %ctx.turn.reference.conversation_id,
                    error = %e,
                    "Could not decode invitation"
                );
                None
            }
        }
    }

    async fn parse(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        let Some(payload) = Self::decode(ctx) else {
            ctx.turn.send_text("I couldn't find an invitation in that URL").await?;
            return StepDirective::end(false);
        };

        ctx.turn
            .send_text(format!(
                "It appears you received an invitation to connect from {}.",
                invitation_label(&payload)
            ))
            .await?;
        StepDirective::prompt(YES_NO_PROMPT, PromptOptions::new("Would you like to accept it?"))
    }

    async fn confirm(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        if ctx.result() == &Value::Bool(true) {
            return StepDirective::next();
        }
        ctx.turn.send_text("Ok").await?;
        StepDirective::end(false)
    }

    async fn accept(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        let Some(agent_id) = ctx.turn.conversation_state.application_state.provisioning_id.clone() else {
            return StepDirective::end(false);
        };
        let Some(payload) = Self::decode(ctx) else {
            return StepDirective::end(false);
        };
        if invitation_type(&payload) != Some(CONNECTION_INVITATION_TYPE) {
            return StepDirective::end(false);
        }
        let invitation: ConnectionInvitationMessage = match serde_json::from_value(payload) {
            Ok(invitation) => invitation,
            Err(e) => {
                warn!(error = %e, "Invitation payload does not match the connection invitation shape");
                ctx.turn.send_text("I couldn't find an invitation in that URL").await?;
                return StepDirective::end(false);
            }
        };

        ctx.turn.send_typing().await?;

        let agent = &self.agent;
        let accepted = call_agent(ctx.turn, async {
            let context = agent.resolve_context(&agent_id).await?;
            agent.accept_invitation(&context, &invitation).await
        })
        .await?;

        let record = match accepted {
            Ok(record) => record,
            Err(e) => {
                return report_agent_failure(ctx.turn, "accept_invitation", "Sorry, I couldn't accept the invitation.", &e)
                    .await
            }
        };

        info!(
            conversation_id = %ctx.turn.reference.conversation_id,
            connection_id = %record.id,
            "Connection request sent"
        );
        ctx.turn
            .send_text("I accepted the invitation and initiated connection")
            .await?;
        Ok(StepDirective::Next(json!(record.id)))
    }

    async fn notify(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        match ctx.result().as_str() {
            Some(connection_id) => StepDirective::begin(
                NOTIFY_CONNECTED,
                NotifyRequest::new(MessageKind::ConnectionResponse, connection_id),
            ),
            None => StepDirective::end(false),
        }
    }
}

#[async_trait]
impl Waterfall for AcceptInvitation {
    fn steps(&self) -> &'static [&'static str] {
        &["parse", "confirm", "require_agent", "provision_if_accepted", "accept", "notify"]
    }

    async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        match step {
            "parse" => self.parse(ctx).await,
            "confirm" => self.confirm(ctx).await,
            "require_agent" => require_agent(ctx, "accepting invitations").await,
            "provision_if_accepted" => provision_if_accepted(ctx).await,
            "accept" => self.accept(ctx).await,
            "notify" => self.notify(ctx).await,
            other => Err(unknown_step(ACCEPT_INVITATION, other)),
        }
    }
}
