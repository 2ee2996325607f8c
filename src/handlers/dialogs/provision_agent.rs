//! Agent provisioning dialog

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::dialogs::{PromptOptions, StepContext, StepDirective, Waterfall};
use crate::models::ProvisioningConfiguration;
use crate::services::AgentService;
use crate::utils::errors::Result;
use super::{call_agent, report_agent_failure, unknown_step, PROVISION_AGENT, TEXT_PROMPT};

const DEFAULT_OWNER_NAME: &str = "Agent Chat Bot";

/// Asks for a name and provisions a fresh agent for the conversation.
///
/// Ends with the new agent id, the existing id when one was already
/// provisioned, or `false` when provisioning failed.
pub struct ProvisionAgent {
    agent: Arc<dyn AgentService>,
    config: AgentConfig,
}

impl ProvisionAgent {
    pub fn new(agent: Arc<dyn AgentService>, config: AgentConfig) -> Self {
        Self { agent, config }
    }

    async fn check_existing(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        let existing = ctx.turn.conversation_state.application_state.provisioning_id.clone();
        match existing {
            Some(agent_id) => {
                ctx.turn.send_text("You already have an agent provisioned.").await?;
                StepDirective::end(agent_id)
            }
            None => StepDirective::next(),
        }
    }

    async fn provision(&self, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        ctx.turn.send_typing().await?;

        let owner_name = match ctx.result() {
            Value::String(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => DEFAULT_OWNER_NAME.to_string(),
        };
        let agent_id = Uuid::new_v4().simple().to_string();
        let request = ProvisioningConfiguration {
            endpoint_uri: format!("{}/{}", self.config.endpoint_host.trim_end_matches('/'), agent_id),
            agent_id: agent_id.clone(),
            wallet_key: self.config.wallet_key.clone(),
            owner_name,
        };

        let provisioned = call_agent(ctx.turn, self.agent.provision_agent(&request)).await?;
        if let Err(e) = provisioned {
            return report_agent_failure(ctx.turn, "provision_agent", "Sorry, I couldn't provision new agent.", &e).await;
        }

        info!(
            conversation_id = %ctx.turn.reference.conversation_id,
            agent_id = %agent_id,
            "Agent provisioned"
        );
        ctx.turn
            .send_text("Your agent is ready. Go ahead and start making connections.")
            .await?;

        let state = &mut ctx.turn.conversation_state.application_state;
        state.provisioning_key = Some(request.wallet_key);
        state.provisioning_id = Some(agent_id.clone());

        StepDirective::end(agent_id)
    }
}

#[async_trait]
impl Waterfall for ProvisionAgent {
    fn steps(&self) -> &'static [&'static str] {
        &["check_existing", "prompt_name", "provision"]
    }

    async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
        match step {
            "check_existing" => self.check_existing(ctx).await,
            "prompt_name" => StepDirective::prompt(
                TEXT_PROMPT,
                PromptOptions::new("What name would you like your agent to use?"),
            ),
            "provision" => self.provision(ctx).await,
            other => Err(unknown_step(PROVISION_AGENT, other)),
        }
    }
}
