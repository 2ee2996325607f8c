//! Test data for conversations and invitations

use serde_json::json;

use AgentBuddy::models::{ChannelAccount, CONNECTION_INVITATION_TYPE};
use AgentBuddy::utils::invitation::encode_invitation;

pub const TEST_CHANNEL: &str = "test";
pub const TEST_CONVERSATION: &str = "chat-1";
pub const TEST_ENDPOINT_HOST: &str = "https://agents.example.test";

pub fn test_user() -> ChannelAccount {
    ChannelAccount::new("user-1", Some("Test User".to_string()))
}

pub fn test_bot_account() -> ChannelAccount {
    ChannelAccount::new("bot-1", Some("AgentBuddy".to_string()))
}

pub fn test_bot_token() -> String {
    "12345:test_token".to_string()
}

/// Invitation link as another agent would publish it
pub fn invitation_link(label: &str) -> String {
    let payload = json!({
        "@type": CONNECTION_INVITATION_TYPE,
        "@id": "inv-alice",
        "label": label,
        "recipientKeys": ["key-alice"],
        "serviceEndpoint": "https://alice.example/agent"
    });
    encode_invitation("https://alice.example/agent", &payload).unwrap()
}
