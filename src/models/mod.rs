//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod activity;
pub mod agent;

// Re-export commonly used models
pub use activity::{Activity, ActivityType, Attachment, ChannelAccount, ConversationReference};
pub use agent::{
    AgentContext, AgentState, ConnectionAlias, ConnectionInvitationMessage, ConnectionRecord,
    ConnectionState, InviteConfiguration, ProvisioningConfiguration, ProvisioningRecord,
    CONNECTION_INVITATION_TYPE,
};
