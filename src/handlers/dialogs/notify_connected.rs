//! Connection notification dialog
//!
//! Registers interest in an agent event and ends straight away. The user
//! hears back later, through the resumer, when the event arrives.

use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::dialogs::{Dialog, DialogAction, DialogInstance};
use crate::services::{ConversationResumer, NotifyRequest};
use crate::state::TurnContext;
use crate::utils::errors::Result;

pub struct NotifyConnected {
    id: String,
    resumer: Arc<ConversationResumer>,
}

impl NotifyConnected {
    pub fn new(id: impl Into<String>, resumer: Arc<ConversationResumer>) -> Self {
        Self {
            id: id.into(),
            resumer,
        }
    }
}

#[async_trait]
impl Dialog for NotifyConnected {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, turn: &mut TurnContext, _instance: &mut DialogInstance, options: Value) -> Result<DialogAction> {
        let Ok(request) = serde_json::from_value::<NotifyRequest>(options) else {
            debug!(dialog_id = %self.id, "No notify request in options");
            return Ok(DialogAction::End(Value::Null));
        };

        match turn.conversation_state.application_state.provisioning_id.clone() {
            Some(agent_id) => {
                self.resumer
                    .notify_on(request, turn.reference.clone(), agent_id)
                    .await;
            }
            None => warn!(
                conversation_id = %turn.reference.conversation_id,
                correlation_id = %request.correlation_id,
                "Notify connected requested, but no agent data found in state"
            ),
        }

        Ok(DialogAction::End(Value::Null))
    }

    async fn continue_dialog(&self, _turn: &mut TurnContext, _instance: &mut DialogInstance) -> Result<DialogAction> {
        Ok(DialogAction::End(Value::Null))
    }
}
