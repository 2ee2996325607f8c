//! Channel adapters
//!
//! Outbound delivery of activities to a conversation, independent of the
//! inbound request that may or may not be in flight.

pub mod recording;
pub mod telegram;

use async_trait::async_trait;

use crate::models::{Activity, ConversationReference};
use crate::utils::errors::Result;

pub use recording::RecordingAdapter;
pub use telegram::TelegramAdapter;

/// Sends activities into a conversation identified by a reference
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    async fn send_activity(&self, reference: &ConversationReference, activity: &Activity) -> Result<()>;
}
