//! Agent service implementation
//! 
//! The agent sidecar owns wallets, provisioning and the connection
//! protocol. This module defines the narrow collaborator interface the
//! dialogs use and a reqwest client for the sidecar's JSON API.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::AgentConfig;
use crate::events::Event;
use crate::models::{
    AgentContext, ConnectionInvitationMessage, ConnectionRecord, InviteConfiguration,
    ProvisioningConfiguration, ProvisioningRecord,
};
use crate::utils::errors::{AgentBuddyError, AgentError, AgentResult, Result};
use crate::utils::logging::log_api_error;

/// Invitation plus the connection record tracking it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedInvitation {
    pub invitation: ConnectionInvitationMessage,
    pub connection: ConnectionRecord,
}

/// A page of agent events after a cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    #[serde(default)]
    pub events: Vec<Event>,
    pub cursor: u64,
}

/// Operations the bot needs from the agent
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Resolve an agent handle; fails when the agent no longer exists
    async fn resolve_context(&self, agent_id: &str) -> AgentResult<AgentContext>;

    async fn provision_agent(&self, config: &ProvisioningConfiguration) -> AgentResult<ProvisioningRecord>;

    async fn get_provisioning(&self, context: &AgentContext) -> AgentResult<ProvisioningRecord>;

    async fn create_invitation(&self, context: &AgentContext, config: &InviteConfiguration) -> AgentResult<CreatedInvitation>;

    /// Send a connection request for `invitation`
    async fn accept_invitation(
        &self,
        context: &AgentContext,
        invitation: &ConnectionInvitationMessage,
    ) -> AgentResult<ConnectionRecord>;

    async fn get_connection(&self, context: &AgentContext, connection_id: &str) -> AgentResult<ConnectionRecord>;

    /// Events observed by the agent after `cursor`
    async fn poll_events(&self, cursor: u64) -> AgentResult<EventBatch>;

    async fn health_check(&self) -> AgentResult<bool>;
}

/// HTTP client for the agent sidecar
#[derive(Debug, Clone)]
pub struct HttpAgentService {
    client: Client,
    base_url: String,
}

impl HttpAgentService {
    /// Create a new HttpAgentService instance
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("AgentBuddy-Bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AgentBuddyError::Http)?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        api: &str,
        request: RequestBuilder,
        not_found: impl FnOnce() -> AgentError,
    ) -> AgentResult<T> {
        let response = request.send().await.map_err(|e| {
            log_api_error("agent", &e.to_string(), Some(api));
            if e.is_timeout() {
                AgentError::Timeout
            } else if e.is_connect() {
                AgentError::ServiceUnavailable
            } else {
                AgentError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(AgentError::ServiceUnavailable);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log_api_error("agent", &format!("HTTP {}", status), Some(api));
            return Err(AgentError::RequestFailed(format!("HTTP {}: {}", status, error_text)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn resolve_context(&self, agent_id: &str) -> AgentResult<AgentContext> {
        debug!(agent_id = agent_id, "Resolving agent context");
        let request = self.client.get(self.url(&format!("/agents/{}", agent_id)));
        self.execute("resolve_context", request, || AgentError::AgentNotFound(agent_id.to_string()))
            .await
    }

    async fn provision_agent(&self, config: &ProvisioningConfiguration) -> AgentResult<ProvisioningRecord> {
        debug!(agent_id = %config.agent_id, owner = %config.owner_name, "Provisioning agent");
        let request = self.client.post(self.url("/agents")).json(config);
        self.execute("provision_agent", request, || {
            AgentError::RequestFailed("provisioning endpoint not found".to_string())
        })
        .await
    }

    async fn get_provisioning(&self, context: &AgentContext) -> AgentResult<ProvisioningRecord> {
        let request = self
            .client
            .get(self.url(&format!("/agents/{}/provisioning", context.agent_id)));
        self.execute("get_provisioning", request, || AgentError::AgentNotFound(context.agent_id.clone()))
            .await
    }

    async fn create_invitation(&self, context: &AgentContext, config: &InviteConfiguration) -> AgentResult<CreatedInvitation> {
        let request = self
            .client
            .post(self.url(&format!("/agents/{}/invitations", context.agent_id)))
            .json(config);
        self.execute("create_invitation", request, || AgentError::AgentNotFound(context.agent_id.clone()))
            .await
    }

    async fn accept_invitation(
        &self,
        context: &AgentContext,
        invitation: &ConnectionInvitationMessage,
    ) -> AgentResult<ConnectionRecord> {
        let request = self
            .client
            .post(self.url(&format!("/agents/{}/connections", context.agent_id)))
            .json(invitation);
        self.execute("accept_invitation", request, || AgentError::AgentNotFound(context.agent_id.clone()))
            .await
    }

    async fn get_connection(&self, context: &AgentContext, connection_id: &str) -> AgentResult<ConnectionRecord> {
        let request = self.client.get(self.url(&format!(
            "/agents/{}/connections/{}",
            context.agent_id, connection_id
        )));
        self.execute("get_connection", request, || AgentError::ConnectionNotFound(connection_id.to_string()))
            .await
    }

    async fn poll_events(&self, cursor: u64) -> AgentResult<EventBatch> {
        let request = self
            .client
            .get(self.url("/events"))
            .query(&[("after", cursor)]);
        self.execute("poll_events", request, || {
            AgentError::RequestFailed("event feed not found".to_string())
        })
        .await
    }

    async fn health_check(&self) -> AgentResult<bool> {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_connect() || e.is_timeout() => Ok(false),
            Err(e) => Err(AgentError::RequestFailed(e.to_string())),
        }
    }
}
