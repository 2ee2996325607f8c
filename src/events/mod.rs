//! Agent events
//!
//! Out-of-band notifications raised when the agent observes protocol
//! traffic, and the replay-buffered bus that routes them to waiting
//! conversations.

pub mod bus;

use serde::{Deserialize, Serialize};

pub use bus::{EventBus, PruneReport, PrunerHandle, SubscriptionHandle};

/// Protocol message types the agent reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ConnectionInvitation,
    ConnectionRequest,
    ConnectionResponse,
    CredentialOffer,
    CredentialRequest,
    Credential,
    ProofRequest,
    Proof,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ConnectionInvitation => "ConnectionInvitation",
            MessageKind::ConnectionRequest => "ConnectionRequest",
            MessageKind::ConnectionResponse => "ConnectionResponse",
            MessageKind::CredentialOffer => "CredentialOffer",
            MessageKind::CredentialRequest => "CredentialRequest",
            MessageKind::Credential => "Credential",
            MessageKind::ProofRequest => "ProofRequest",
            MessageKind::Proof => "Proof",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An observed protocol message, keyed by the record it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: MessageKind,
    pub correlation_id: String,
}

impl Event {
    pub fn new(kind: MessageKind, correlation_id: impl Into<String>) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.into(),
        }
    }

    pub fn matches(&self, kind: MessageKind, correlation_id: &str) -> bool {
        self.kind == kind && self.correlation_id == correlation_id
    }
}
