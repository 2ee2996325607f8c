//! Persisted conversation and user state
//! 
//! This module defines the blobs written to the state store at the end of
//! every turn: the conversation's dialog stack plus application state, and
//! the cross-conversation user record.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::dialogs::DialogStack;
use crate::models::AgentState;
use crate::utils::errors::Result;

/// Per-conversation persisted state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    #[serde(default)]
    pub dialog_stack: DialogStack,
    #[serde(default)]
    pub application_state: AgentState,
}

/// Per-user persisted state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    /// Messages received from this user across all conversations
    #[serde(default)]
    pub turn_count: u64,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            turn_count: 0,
            data: HashMap::new(),
            updated_at: Utc::now(),
        }
    }
}

impl UserState {
    /// Set a flag or value on the user
    pub fn set_data<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), json_value);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Get a typed value stored on the user
    pub fn get_data<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn remove_data(&mut self, key: &str) -> Option<serde_json::Value> {
        self.updated_at = Utc::now();
        self.data.remove(key)
    }

    /// Count one more message from this user
    pub fn record_turn(&mut self) -> u64 {
        self.turn_count += 1;
        self.updated_at = Utc::now();
        self.turn_count
    }
}
