//! In-memory channel that records everything sent through it

use std::sync::Mutex;
use async_trait::async_trait;

use crate::models::{Activity, ActivityType, ConversationReference};
use crate::utils::errors::{AgentBuddyError, Result};
use super::ChannelAdapter;

/// Records outbound activities; can be told to fail for a conversation
/// or for a number of upcoming sends
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<(ConversationReference, Activity)>>,
    unreachable: Mutex<Vec<String>>,
    failing_sends: Mutex<usize>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to this conversation fail with a channel error
    pub fn mark_unreachable(&self, conversation_id: &str) {
        self.unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(conversation_id.to_string());
    }

    pub fn mark_reachable(&self, conversation_id: &str) {
        self.unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|id| id != conversation_id);
    }

    /// Fail the next `count` sends, whatever their conversation
    pub fn fail_next(&self, count: usize) {
        *self.failing_sends.lock().unwrap_or_else(|e| e.into_inner()) = count;
    }

    pub fn activities(&self) -> Vec<(ConversationReference, Activity)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Text of every message sent, typing indicators excluded
    pub fn texts(&self) -> Vec<String> {
        self.activities()
            .into_iter()
            .filter(|(_, a)| a.activity_type == ActivityType::Message)
            .map(|(_, a)| a.text)
            .collect()
    }

    pub fn last(&self) -> Option<Activity> {
        self.activities().pop().map(|(_, a)| a)
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    async fn send_activity(&self, reference: &ConversationReference, activity: &Activity) -> Result<()> {
        {
            let mut failing = self.failing_sends.lock().unwrap_or_else(|e| e.into_inner());
            if *failing > 0 {
                *failing -= 1;
                return Err(AgentBuddyError::Channel("transient send failure".to_string()));
            }
        }

        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&reference.conversation_id);
        if unreachable {
            return Err(AgentBuddyError::Channel(format!(
                "conversation {} is unreachable",
                reference.conversation_id
            )));
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((reference.clone(), activity.clone()));
        Ok(())
    }
}
