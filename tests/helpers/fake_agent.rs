//! Scripted agent service for testing
//!
//! Keeps agents and connections in memory and records what the bot asked
//! for, so tests can both drive outcomes and assert on calls.

use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;

use AgentBuddy::events::Event;
use AgentBuddy::models::{
    AgentContext, ConnectionAlias, ConnectionInvitationMessage, ConnectionRecord, ConnectionState,
    InviteConfiguration, ProvisioningConfiguration, ProvisioningRecord, CONNECTION_INVITATION_TYPE,
};
use AgentBuddy::services::{AgentService, CreatedInvitation, EventBatch};
use AgentBuddy::utils::errors::{AgentError, AgentResult};

#[derive(Debug, Default)]
struct FakeAgentState {
    agents: HashMap<String, ProvisioningRecord>,
    connections: HashMap<String, ConnectionRecord>,
    provisioned: Vec<ProvisioningConfiguration>,
    accepted: Vec<ConnectionInvitationMessage>,
    fail_provisioning: Option<String>,
    fail_invitations: bool,
    events: Vec<Event>,
    next_connection: u32,
}

#[derive(Debug, Default)]
pub struct FakeAgentService {
    state: Mutex<FakeAgentState>,
}

impl FakeAgentService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeAgentState> {
        self.state.lock().unwrap()
    }

    /// Register an agent as if it had been provisioned earlier
    pub fn add_agent(&self, agent_id: &str, endpoint_uri: &str) {
        self.state().agents.insert(
            agent_id.to_string(),
            ProvisioningRecord {
                endpoint_uri: endpoint_uri.to_string(),
                owner_name: None,
            },
        );
    }

    pub fn remove_agent(&self, agent_id: &str) {
        self.state().agents.remove(agent_id);
    }

    pub fn fail_provisioning(&self, message: &str) {
        self.state().fail_provisioning = Some(message.to_string());
    }

    pub fn fail_invitations(&self) {
        self.state().fail_invitations = true;
    }

    /// Name the remote party of a connection, as the protocol would once connected
    pub fn connect(&self, connection_id: &str, alias: Option<&str>) {
        if let Some(record) = self.state().connections.get_mut(connection_id) {
            record.state = ConnectionState::Connected;
            record.alias = Some(ConnectionAlias {
                name: alias.map(str::to_string),
            });
        }
    }

    pub fn queue_event(&self, event: Event) {
        self.state().events.push(event);
    }

    pub fn provisioned(&self) -> Vec<ProvisioningConfiguration> {
        self.state().provisioned.clone()
    }

    pub fn accepted(&self) -> Vec<ConnectionInvitationMessage> {
        self.state().accepted.clone()
    }

    pub fn connection(&self, connection_id: &str) -> Option<ConnectionRecord> {
        self.state().connections.get(connection_id).cloned()
    }

    fn new_connection(state: &mut FakeAgentState, connection_state: ConnectionState) -> ConnectionRecord {
        state.next_connection += 1;
        let record = ConnectionRecord {
            id: format!("conn-{}", state.next_connection),
            state: connection_state,
            alias: None,
        };
        state.connections.insert(record.id.clone(), record.clone());
        record
    }
}

#[async_trait]
impl AgentService for FakeAgentService {
    async fn resolve_context(&self, agent_id: &str) -> AgentResult<AgentContext> {
        if self.state().agents.contains_key(agent_id) {
            Ok(AgentContext {
                agent_id: agent_id.to_string(),
            })
        } else {
            Err(AgentError::AgentNotFound(agent_id.to_string()))
        }
    }

    async fn provision_agent(&self, config: &ProvisioningConfiguration) -> AgentResult<ProvisioningRecord> {
        let mut state = self.state();
        if let Some(message) = state.fail_provisioning.clone() {
            return Err(AgentError::RequestFailed(message));
        }
        let record = ProvisioningRecord {
            endpoint_uri: config.endpoint_uri.clone(),
            owner_name: Some(config.owner_name.clone()),
        };
        state.agents.insert(config.agent_id.clone(), record.clone());
        state.provisioned.push(config.clone());
        Ok(record)
    }

    async fn get_provisioning(&self, context: &AgentContext) -> AgentResult<ProvisioningRecord> {
        self.state()
            .agents
            .get(&context.agent_id)
            .cloned()
            .ok_or_else(|| AgentError::AgentNotFound(context.agent_id.clone()))
    }

    async fn create_invitation(&self, context: &AgentContext, _config: &InviteConfiguration) -> AgentResult<CreatedInvitation> {
        let mut state = self.state();
        if state.fail_invitations {
            return Err(AgentError::ServiceUnavailable);
        }
        let provisioning = state
            .agents
            .get(&context.agent_id)
            .cloned()
            .ok_or_else(|| AgentError::AgentNotFound(context.agent_id.clone()))?;

        let connection = Self::new_connection(&mut state, ConnectionState::Invited);
        let invitation = ConnectionInvitationMessage {
            message_type: CONNECTION_INVITATION_TYPE.to_string(),
            id: Some(format!("inv-{}", connection.id)),
            label: provisioning.owner_name.clone(),
            recipient_keys: vec![format!("key-{}", connection.id)],
            service_endpoint: Some(provisioning.endpoint_uri.clone()),
            routing_keys: Vec::new(),
        };
        Ok(CreatedInvitation { invitation, connection })
    }

    async fn accept_invitation(
        &self,
        _context: &AgentContext,
        invitation: &ConnectionInvitationMessage,
    ) -> AgentResult<ConnectionRecord> {
        let mut state = self.state();
        state.accepted.push(invitation.clone());
        Ok(Self::new_connection(&mut state, ConnectionState::Negotiating))
    }

    async fn get_connection(&self, _context: &AgentContext, connection_id: &str) -> AgentResult<ConnectionRecord> {
        self.state()
            .connections
            .get(connection_id)
            .cloned()
            .ok_or_else(|| AgentError::ConnectionNotFound(connection_id.to_string()))
    }

    async fn poll_events(&self, cursor: u64) -> AgentResult<EventBatch> {
        let events: Vec<Event> = std::mem::take(&mut self.state().events);
        let cursor = cursor + events.len() as u64;
        Ok(EventBatch { events, cursor })
    }

    async fn health_check(&self) -> AgentResult<bool> {
        Ok(true)
    }
}
