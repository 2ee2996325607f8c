//! Agent model
//!
//! Application state kept per conversation and the records exchanged with
//! the agent sidecar.

use serde::{Deserialize, Serialize};

/// `@type` of a connection invitation message
pub const CONNECTION_INVITATION_TYPE: &str =
    "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/connections/1.0/invitation";

/// Per-conversation application state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub provisioning_key: Option<String>,
    #[serde(default)]
    pub provisioning_id: Option<String>,
}

impl AgentState {
    pub fn is_provisioned(&self) -> bool {
        self.provisioning_id.is_some()
    }
}

/// Handle to a resolved agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub agent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningConfiguration {
    pub agent_id: String,
    pub wallet_key: String,
    pub endpoint_uri: String,
    pub owner_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRecord {
    pub endpoint_uri: String,
    #[serde(default)]
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteConfiguration {
    pub auto_accept_connection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Invited,
    Negotiating,
    Connected,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAlias {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,
    pub state: ConnectionState,
    #[serde(default)]
    pub alias: Option<ConnectionAlias>,
}

impl ConnectionRecord {
    /// Display name of the remote party, if it told us one
    pub fn alias_name(&self) -> Option<&str> {
        self.alias.as_ref().and_then(|a| a.name.as_deref())
    }
}

/// Connection invitation as carried in the `c_i` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInvitationMessage {
    #[serde(rename = "@type")]
    pub message_type: String,
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub recipient_keys: Vec<String>,
    #[serde(default)]
    pub service_endpoint: Option<String>,
    #[serde(default)]
    pub routing_keys: Vec<String>,
}
