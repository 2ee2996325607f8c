//! Dialog definitions and the name-keyed registry

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::state::TurnContext;
use crate::utils::errors::{AgentBuddyError, Result};
use super::context::DialogContext;
use super::instance::{DialogAction, DialogInstance};

/// A named, resumable unit of interaction
#[async_trait]
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    /// Called once when the dialog is pushed
    async fn begin(&self, turn: &mut TurnContext, instance: &mut DialogInstance, options: Value) -> Result<DialogAction>;

    /// Called with the raw turn input while this dialog is on top
    async fn continue_dialog(&self, turn: &mut TurnContext, instance: &mut DialogInstance) -> Result<DialogAction>;

    /// Called when a child this dialog began has ended
    async fn resume(&self, _turn: &mut TurnContext, _instance: &mut DialogInstance, result: Value) -> Result<DialogAction> {
        Ok(DialogAction::End(result))
    }
}

/// Dialog definitions by name; read-only once built
#[derive(Default, Clone)]
pub struct DialogRegistry {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
}

impl DialogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialog under its id; a later registration replaces an earlier one
    pub fn add<D: Dialog + 'static>(&mut self, dialog: D) -> &mut Self {
        let id = dialog.id().to_string();
        if self.dialogs.insert(id.clone(), Arc::new(dialog)).is_some() {
            warn!(dialog_id = %id, "Dialog registered twice, keeping the latest");
        }
        self
    }

    pub fn find(&self, dialog_id: &str) -> Result<Arc<dyn Dialog>> {
        self.dialogs
            .get(dialog_id)
            .cloned()
            .ok_or_else(|| AgentBuddyError::UnknownDialog { dialog_id: dialog_id.to_string() })
    }

    pub fn contains(&self, dialog_id: &str) -> bool {
        self.dialogs.contains_key(dialog_id)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Bind a dialog context to the stack loaded into `turn`
    pub fn create_context<'a>(&'a self, turn: &'a mut TurnContext) -> DialogContext<'a> {
        DialogContext::new(self, turn)
    }
}

impl std::fmt::Debug for DialogRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.dialogs.keys().collect();
        ids.sort();
        f.debug_struct("DialogRegistry").field("dialogs", &ids).finish()
    }
}
