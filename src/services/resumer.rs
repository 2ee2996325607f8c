//! Conversation resumption
//!
//! Bridges bus events to dormant conversations: a dialog asks to be told
//! when an event for its correlation id arrives, and when it does the
//! resumer re-enters the conversation outside any inbound turn.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::channels::ChannelAdapter;
use crate::events::{Event, EventBus, MessageKind, SubscriptionHandle};
use crate::models::{Activity, ConversationReference};
use crate::state::StateAccessors;
use crate::utils::errors::{AgentBuddyError, AgentError, Result};
use crate::utils::logging::log_resumption;
use super::agent::AgentService;

/// Event a dialog wants to hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub kind: MessageKind,
    pub correlation_id: String,
}

impl NotifyRequest {
    pub fn new(kind: MessageKind, correlation_id: impl Into<String>) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.into(),
        }
    }
}

pub struct ConversationResumer {
    bus: EventBus,
    agent: Arc<dyn AgentService>,
    adapter: Arc<dyn ChannelAdapter>,
    accessors: StateAccessors,
}

impl ConversationResumer {
    pub fn new(
        bus: EventBus,
        agent: Arc<dyn AgentService>,
        adapter: Arc<dyn ChannelAdapter>,
        accessors: StateAccessors,
    ) -> Self {
        Self {
            bus,
            agent,
            adapter,
            accessors,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribe on behalf of `reference`.
    ///
    /// Returns `None` without subscribing when `agent_id` cannot be resolved;
    /// the requesting dialog has already ended, so this is only logged.
    pub async fn notify_on(
        self: &Arc<Self>,
        request: NotifyRequest,
        reference: ConversationReference,
        agent_id: String,
    ) -> Option<SubscriptionHandle> {
        if let Err(e) = self.agent.resolve_context(&agent_id).await {
            warn!(
                agent_id = %agent_id,
                correlation_id = %request.correlation_id,
                error = %e,
                "Cannot resolve agent, not subscribing"
            );
            return None;
        }

        let resumer = Arc::clone(self);
        let NotifyRequest { kind, correlation_id } = request;
        Some(self.bus.subscribe(
            move |event| event.matches(kind, &correlation_id),
            move |event| async move {
                let correlation_id = event.correlation_id.clone();
                match resumer.handle_event(event, &reference, &agent_id).await {
                    Ok(()) => log_resumption(&reference.conversation_id, &correlation_id, true, None),
                    Err(e @ AgentBuddyError::StaleCorrelation { .. }) => {
                        log_resumption(&reference.conversation_id, &correlation_id, false, Some(&e.to_string()))
                    }
                    Err(e) => error!(
                        conversation_id = %reference.conversation_id,
                        correlation_id = %correlation_id,
                        error = %e,
                        "Failed to resume conversation"
                    ),
                }
            },
        ))
    }

    /// Resolve what happened and tell the conversation about it
    pub async fn handle_event(&self, event: Event, reference: &ConversationReference, agent_id: &str) -> Result<()> {
        let context = match self.agent.resolve_context(agent_id).await {
            Ok(context) => context,
            Err(e) => return Err(stale(&event, agent_id, e)),
        };
        let connection = match self.agent.get_connection(&context, &event.correlation_id).await {
            Ok(connection) => connection,
            Err(e) => return Err(stale(&event, agent_id, e)),
        };

        let text = match event.kind {
            MessageKind::ConnectionRequest | MessageKind::ConnectionResponse => format!(
                "You are now connected to {}",
                connection.alias_name().unwrap_or("[unspecified]")
            ),
            other => format!("Received {} for {}", other, event.correlation_id),
        };

        self.continue_conversation(reference, Activity::message(text)).await
    }

    /// Send into a conversation with no inbound request, under the same
    /// lock and save discipline as a normal turn
    pub async fn continue_conversation(&self, reference: &ConversationReference, message: Activity) -> Result<()> {
        let _guard = self.accessors.lock(reference).await;

        let mut turn = self
            .accessors
            .begin_turn(Activity::continuation(reference), self.adapter.clone(), CancellationToken::new())
            .await?;
        let sent = turn.send_activity(message).await;
        self.accessors.save(&turn).await?;
        sent
    }
}

fn stale(event: &Event, agent_id: &str, error: AgentError) -> AgentBuddyError {
    warn!(agent_id = agent_id, correlation_id = %event.correlation_id, error = %error, "Dropping event");
    AgentBuddyError::StaleCorrelation {
        correlation_id: event.correlation_id.clone(),
    }
}

impl std::fmt::Debug for ConversationResumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationResumer")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
