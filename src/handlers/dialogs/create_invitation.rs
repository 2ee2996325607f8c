//! Invitation creation dialog

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::dialogs::{StepContext, StepDirective, Waterfall};
use crate::events::MessageKind;
use crate::models::{Activity, Attachment, InviteConfiguration};
use crate::services::{AgentService, NotifyRequest};
use crate::utils::errors::{AgentError, Result};
use crate::utils::invitation::encode_invitation;
use super::{
    call_agent, provision_if_accepted, report_agent_failure, require_agent, unknown_step,
    CREATE_INVITATION, NOTIFY_CONNECTED,
};

const QR_CODE_BASE: &str = "https://chart.googleapis.com/chart?cht=qr&chs=300x300&chld=M|0&chl=";

/// QR code image URL for an invitation link
pub fn qr_code_url(link: &str) -> String {
    format!("{}{}", QR_CODE_BASE, urlencoding::encode(link))
}

/// Creates an auto-accepting invitation, shows it as a QR code and a link,
/// and asks to be told when someone connects through it
pub struct CreateInvitation {
    agent: Arc<dyn AgentService>,
}

impl CreateInvitation {
    pub fn new(agent: Arc<dyn AgentService>) -> Self {
        Self { agent }
    }

    async fn create(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        let Some(agent_id) = ctx.turn.conversation_state.application_state.provisioning_id.clone() else {
            ctx.turn
                .send_text("Sorry, I couldn't find information about your agent")
                .await?;
            return StepDirective::end(false);
        };
        ctx.turn.send_typing().await?;

        let agent = &self.agent;
        let created = call_agent(ctx.turn, async {
            let context = agent.resolve_context(&agent_id).await?;
            let provisioning = agent.get_provisioning(&context).await?;
            let created = agent
                .create_invitation(&context, &InviteConfiguration { auto_accept_connection: true })
                .await?;
            Ok::<_, AgentError>((provisioning, created))
        })
        .await?;

        let (provisioning, created) = match created {
            Ok(created) => created,
            Err(e) => {
                return report_agent_failure(ctx.turn, "create_invitation", "Sorry, I couldn't create an invitation.", &e)
                    .await
            }
        };

        let link = encode_invitation(&provisioning.endpoint_uri, &created.invitation)?;
        info!(
            conversation_id = %ctx.turn.reference.conversation_id,
            connection_id = %created.connection.id,
            "Invitation created"
        );

        ctx.turn
            .send_activity(
                Activity::message("Here are the invitation details")
                    .with_attachment(Attachment::image(qr_code_url(&link))),
            )
            .await?;
        ctx.turn.send_text(link).await?;

        Ok(StepDirective::Next(json!(created.connection.id)))
    }

    async fn notify(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        match ctx.result().as_str() {
            Some(connection_id) => StepDirective::begin(
                NOTIFY_CONNECTED,
                NotifyRequest::new(MessageKind::ConnectionRequest, connection_id),
            ),
            None => StepDirective::end(false),
        }
    }
}

#[async_trait]
impl Waterfall for CreateInvitation {
    fn steps(&self) -> &'static [&'static str] {
        &["require_agent", "provision_if_accepted", "create", "notify"]
    }

    async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        match step {
            "require_agent" => require_agent(ctx, "creating invitations").await,
            "provision_if_accepted" => provision_if_accepted(ctx).await,
            "create" => self.create(ctx).await,
            "notify" => self.notify(ctx).await,
            other => Err(unknown_step(CREATE_INVITATION, other)),
        }
    }
}
