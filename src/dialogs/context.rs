//! Per-turn dialog orchestration
//!
//! `DialogContext` dispatches Begin, Continue and End against the stack held
//! in the turn's conversation state. Stack mutations land directly in that
//! state, so whatever the outcome the caller persists it once at turn end.
//!
//! A dialog that asks for a child records the request on its own instance
//! until the child is on the stack. If the child fails to begin, the next
//! turn begins it again instead of handing user input to the parent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::state::TurnContext;
use crate::utils::errors::{AgentBuddyError, Result};
use crate::utils::logging::log_dialog_transition;
use super::instance::{DialogAction, DialogInstance, DialogStack, DialogTurnResult};
use super::registry::DialogRegistry;

const PENDING_CHILD_KEY: &str = "pendingChild";

/// A child the parent asked for that is not on the stack yet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingChild {
    dialog_id: String,
    #[serde(default)]
    options: Value,
}

enum Dispatch {
    Continue,
    Resume(Value),
}

pub struct DialogContext<'a> {
    registry: &'a DialogRegistry,
    turn: &'a mut TurnContext,
}

impl<'a> DialogContext<'a> {
    pub(crate) fn new(registry: &'a DialogRegistry, turn: &'a mut TurnContext) -> Self {
        Self { registry, turn }
    }

    pub fn turn(&mut self) -> &mut TurnContext {
        &mut *self.turn
    }

    pub fn stack(&self) -> &DialogStack {
        &self.turn.conversation_state.dialog_stack
    }

    fn stack_mut(&mut self) -> &mut DialogStack {
        &mut self.turn.conversation_state.dialog_stack
    }

    pub fn active_dialog(&self) -> Option<&DialogInstance> {
        self.stack().top()
    }

    /// Push `dialog_id` and begin it with `options`.
    ///
    /// An unregistered id fails with `UnknownDialog` and leaves the stack as it was.
    pub async fn begin_dialog(&mut self, dialog_id: &str, options: Value) -> Result<DialogTurnResult> {
        let action = self.push_and_begin(dialog_id, options).await?;
        self.drive(action).await
    }

    /// Hand the turn input to the top dialog
    pub async fn continue_dialog(&mut self) -> Result<DialogTurnResult> {
        if self.stack().is_empty() {
            return Ok(DialogTurnResult::Empty);
        }
        let pending = self
            .active_dialog()
            .and_then(|top| top.get::<PendingChild>(PENDING_CHILD_KEY));
        let action = match pending {
            Some(child) => {
                debug!(dialog_id = %child.dialog_id, "Beginning child that failed to start");
                DialogAction::BeginChild {
                    dialog_id: child.dialog_id,
                    options: child.options,
                }
            }
            None => self.dispatch_top(Dispatch::Continue).await?,
        };
        self.drive(action).await
    }

    /// Pop the top dialog and resume its parent with `result`
    pub async fn end_dialog(&mut self, result: Value) -> Result<DialogTurnResult> {
        if self.stack().is_empty() {
            return Ok(DialogTurnResult::Empty);
        }
        self.drive(DialogAction::End(result)).await
    }

    /// Drop every active dialog, returning how many were removed
    pub fn cancel_all_dialogs(&mut self) -> usize {
        let count = self.stack().len();
        self.stack_mut().clear();
        count
    }

    async fn drive(&mut self, mut action: DialogAction) -> Result<DialogTurnResult> {
        loop {
            action = match action {
                DialogAction::Wait => return Ok(DialogTurnResult::Waiting),
                DialogAction::BeginChild { dialog_id, options } => {
                    self.begin_child(dialog_id, options).await?
                }
                DialogAction::End(result) => {
                    if let Some(ended) = self.stack_mut().pop() {
                        self.log_transition(&ended.dialog_id, "end");
                    }
                    if self.stack().is_empty() {
                        return Ok(DialogTurnResult::Complete(result));
                    }
                    self.dispatch_top(Dispatch::Resume(result)).await?
                }
            };
        }
    }

    async fn push_and_begin(&mut self, dialog_id: &str, options: Value) -> Result<DialogAction> {
        self.turn.ensure_active()?;
        let dialog = self.registry.find(dialog_id)?;

        let mut instance = DialogInstance::new(dialog_id);
        let action = dialog.begin(&mut *self.turn, &mut instance, options).await?;
        // Whatever sits below is now this dialog's parent
        if let Some(parent) = self.stack_mut().top_mut() {
            parent.remove(PENDING_CHILD_KEY);
        }
        self.stack_mut().push(instance);
        self.log_transition(dialog_id, "begin");
        Ok(action)
    }

    /// Begin a child of the top dialog, recording it on the parent first
    async fn begin_child(&mut self, dialog_id: String, options: Value) -> Result<DialogAction> {
        self.registry.find(&dialog_id)?;
        if let Some(parent) = self.stack_mut().top_mut() {
            parent.set(
                PENDING_CHILD_KEY,
                PendingChild {
                    dialog_id: dialog_id.clone(),
                    options: options.clone(),
                },
            )?;
        }
        self.push_and_begin(&dialog_id, options).await
    }

    async fn dispatch_top(&mut self, dispatch: Dispatch) -> Result<DialogAction> {
        self.turn.ensure_active()?;
        let mut instance = self.stack_mut().pop().ok_or_else(|| AgentBuddyError::InvalidStateTransition {
            from: "empty stack".to_string(),
            to: "dispatch".to_string(),
        })?;

        let dialog = match self.registry.find(&instance.dialog_id) {
            Ok(dialog) => dialog,
            Err(e) => {
                self.stack_mut().push(instance);
                return Err(e);
            }
        };

        let transition = match &dispatch {
            Dispatch::Continue => "continue",
            Dispatch::Resume(_) => "resume",
        };
        let result = match dispatch {
            Dispatch::Continue => dialog.continue_dialog(&mut *self.turn, &mut instance).await,
            Dispatch::Resume(value) => dialog.resume(&mut *self.turn, &mut instance, value).await,
        };

        let dialog_id = instance.dialog_id.clone();
        self.stack_mut().push(instance);
        self.log_transition(&dialog_id, transition);
        result
    }

    fn log_transition(&self, dialog_id: &str, transition: &str) {
        log_dialog_transition(
            &self.turn.reference.conversation_id,
            dialog_id,
            transition,
            self.stack().len(),
        );
    }
}
