//! Dialog instances and the persisted dialog stack

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::errors::Result;

/// Runtime record of one active dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogInstance {
    pub dialog_id: String,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl DialogInstance {
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog_id: dialog_id.into(),
            state: Map::new(),
        }
    }

    /// Typed read of a state entry; missing or mistyped entries read as `None`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.state
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.state.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }
}

/// Active dialogs for one conversation, innermost last
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogStack(Vec<DialogInstance>);

impl DialogStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, instance: DialogInstance) {
        self.0.push(instance);
    }

    pub fn pop(&mut self) -> Option<DialogInstance> {
        self.0.pop()
    }

    pub fn top(&self) -> Option<&DialogInstance> {
        self.0.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut DialogInstance> {
        self.0.last_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DialogInstance> {
        self.0.iter()
    }

    /// Dialog ids from outermost to innermost
    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|i| i.dialog_id.as_str()).collect()
    }
}

/// What a dialog wants the engine to do next
#[derive(Debug, Clone, PartialEq)]
pub enum DialogAction {
    /// Input is pending; nothing more happens this turn
    Wait,
    /// Push and begin a child; the caller is resumed with its result
    BeginChild { dialog_id: String, options: Value },
    /// Pop the caller, surfacing the value to its parent
    End(Value),
}

/// Outcome of a dispatch on the dialog context
#[derive(Debug, Clone, PartialEq)]
pub enum DialogTurnResult {
    /// The stack was empty; nothing ran
    Empty,
    /// A dialog is waiting for input
    Waiting,
    /// The stack emptied during this dispatch
    Complete(Value),
}

impl DialogTurnResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, DialogTurnResult::Complete(_))
    }
}
