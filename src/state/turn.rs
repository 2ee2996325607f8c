//! Per-turn context
//!
//! A `TurnContext` is threaded explicitly through every dialog and step. It
//! carries the inbound activity, the loaded state, the outbound channel and
//! the turn's cancellation signal.

use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::channels::ChannelAdapter;
use crate::models::{Activity, ConversationReference};
use crate::utils::errors::{AgentBuddyError, Result};
use super::context::{ConversationState, UserState};

pub struct TurnContext {
    pub activity: Activity,
    pub reference: ConversationReference,
    pub conversation_state: ConversationState,
    pub user_state: UserState,
    adapter: Arc<dyn ChannelAdapter>,
    cancel: CancellationToken,
    responded: bool,
}

impl TurnContext {
    pub fn new(
        activity: Activity,
        conversation_state: ConversationState,
        user_state: UserState,
        adapter: Arc<dyn ChannelAdapter>,
        cancel: CancellationToken,
    ) -> Self {
        let reference = activity.conversation_reference();
        Self {
            activity,
            reference,
            conversation_state,
            user_state,
            adapter,
            cancel,
            responded: false,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn ChannelAdapter> {
        &self.adapter
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether anything has been sent during this turn
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// Conversation key used for state and locking
    pub fn conversation_key(&self) -> String {
        self.reference.conversation_key()
    }

    /// Fail fast once the turn has been cancelled
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AgentBuddyError::Cancelled);
        }
        Ok(())
    }

    /// Await `fut` unless the turn is cancelled first
    pub async fn run_cancellable<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentBuddyError::Cancelled),
            result = fut => result,
        }
    }

    pub async fn send_activity(&mut self, activity: Activity) -> Result<()> {
        self.ensure_active()?;
        self.adapter.send_activity(&self.reference, &activity).await?;
        self.responded = true;
        Ok(())
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.send_activity(Activity::message(text)).await
    }

    pub async fn send_typing(&mut self) -> Result<()> {
        self.send_activity(Activity::typing()).await
    }
}

impl std::fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnContext")
            .field("activity", &self.activity)
            .field("reference", &self.reference)
            .field("conversation_state", &self.conversation_state)
            .field("responded", &self.responded)
            .finish_non_exhaustive()
    }
}
