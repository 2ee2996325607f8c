//! Waterfall dialogs
//!
//! A waterfall is an ordered list of named steps. Each step sees either the
//! dialog's options (first step) or the value produced by the previous step
//! or child dialog, and answers with a `StepDirective`.
//!
//! A step that fails is kept with its input; the next turn runs it again
//! rather than passing the new user text to the step after it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::state::TurnContext;
use crate::utils::errors::{AgentBuddyError, Result};
use super::instance::{DialogAction, DialogInstance};
use super::prompts::PromptOptions;
use super::registry::Dialog;

const STEP_INDEX_KEY: &str = "stepIndex";
const OPTIONS_KEY: &str = "options";
const VALUES_KEY: &str = "values";
const INTERRUPTED_KEY: &str = "interruptedStep";

static NULL: Value = Value::Null;

/// What a step asks the waterfall to do next
#[derive(Debug, Clone, PartialEq)]
pub enum StepDirective {
    /// Run the next step with this value; past the last step the dialog ends with it
    Next(Value),
    /// Suspend at this step and push a child; the next step receives its result
    BeginChild { dialog_id: String, options: Value },
    /// End the dialog now, skipping any remaining steps
    End(Value),
}

impl StepDirective {
    pub fn next() -> Result<Self> {
        Ok(StepDirective::Next(Value::Null))
    }

    pub fn end(value: impl Into<Value>) -> Result<Self> {
        Ok(StepDirective::End(value.into()))
    }

    /// Begin a child dialog with serializable options
    pub fn begin<T: Serialize>(dialog_id: &str, options: T) -> Result<Self> {
        Ok(StepDirective::BeginChild {
            dialog_id: dialog_id.to_string(),
            options: serde_json::to_value(options)?,
        })
    }

    /// Begin a prompt dialog
    pub fn prompt(dialog_id: &str, options: PromptOptions) -> Result<Self> {
        Self::begin(dialog_id, options)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InterruptedStep {
    index: usize,
    #[serde(default)]
    input: Value,
}

/// Everything a step can see and touch
pub struct StepContext<'a> {
    pub turn: &'a mut TurnContext,
    instance: &'a mut DialogInstance,
    index: usize,
    step: &'static str,
    result: Value,
}

impl<'a> StepContext<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn step(&self) -> &'static str {
        self.step
    }

    /// Options the dialog was begun with
    pub fn options(&self) -> &Value {
        self.instance.get_value(OPTIONS_KEY).unwrap_or(&NULL)
    }

    /// Input to this step
    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn take_result(&mut self) -> Value {
        std::mem::take(&mut self.result)
    }

    /// Read a value captured by an earlier step
    pub fn value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.instance
            .get_value(VALUES_KEY)
            .and_then(|values| values.get(key))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Keep a value for later steps of this dialog
    pub fn set_value<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let values = self
            .instance
            .state
            .entry(VALUES_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !values.is_object() {
            *values = Value::Object(Map::new());
        }
        if let Value::Object(map) = values {
            map.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// Step definitions for a waterfall dialog
#[async_trait]
pub trait Waterfall: Send + Sync {
    /// Step names in execution order
    fn steps(&self) -> &'static [&'static str];

    async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective>;
}

/// Adapts a `Waterfall` to the `Dialog` contract
pub struct WaterfallDialog<W> {
    id: String,
    waterfall: W,
}

impl<W: Waterfall> WaterfallDialog<W> {
    pub fn new(id: impl Into<String>, waterfall: W) -> Self {
        Self {
            id: id.into(),
            waterfall,
        }
    }

    fn current_index(&self, instance: &DialogInstance) -> Result<usize> {
        let index = instance.get::<usize>(STEP_INDEX_KEY).unwrap_or(0);
        let count = self.waterfall.steps().len();
        if index >= count {
            return Err(AgentBuddyError::StepOutOfRange {
                dialog_id: self.id.clone(),
                index,
                count,
            });
        }
        Ok(index)
    }

    async fn run_from(
        &self,
        turn: &mut TurnContext,
        instance: &mut DialogInstance,
        mut index: usize,
        mut input: Value,
    ) -> Result<DialogAction> {
        let steps = self.waterfall.steps();
        instance.remove(INTERRUPTED_KEY);
        loop {
            if index >= steps.len() {
                return Ok(DialogAction::End(input));
            }
            if let Err(e) = turn.ensure_active() {
                return Err(self.interrupt(instance, index, input, e));
            }
            instance.set(STEP_INDEX_KEY, index)?;

            let step = steps[index];
            debug!(dialog_id = %self.id, step = step, index = index, "Running waterfall step");

            let outcome = {
                let mut ctx = StepContext {
                    turn: &mut *turn,
                    instance: &mut *instance,
                    index,
                    step,
                    result: input.clone(),
                };
                self.waterfall.run_step(step, &mut ctx).await
            };
            let directive = match outcome {
                Ok(directive) => directive,
                Err(e) => return Err(self.interrupt(instance, index, input, e)),
            };

            match directive {
                StepDirective::Next(value) => {
                    index += 1;
                    input = value;
                }
                StepDirective::BeginChild { dialog_id, options } => {
                    return Ok(DialogAction::BeginChild { dialog_id, options });
                }
                StepDirective::End(value) => return Ok(DialogAction::End(value)),
            }
        }
    }
}

impl<W> WaterfallDialog<W> {
    /// Keep the failed step and its input for the next turn, passing `error` on
    fn interrupt(&self, instance: &mut DialogInstance, index: usize, input: Value, error: AgentBuddyError) -> AgentBuddyError {
        debug!(dialog_id = %self.id, index = index, error = %error, "Waterfall step interrupted");
        if let Err(e) = instance.set(INTERRUPTED_KEY, InterruptedStep { index, input }) {
            return e;
        }
        error
    }
}

#[async_trait]
impl<W: Waterfall + 'static> Dialog for WaterfallDialog<W> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin(&self, turn: &mut TurnContext, instance: &mut DialogInstance, options: Value) -> Result<DialogAction> {
        instance.set(OPTIONS_KEY, &options)?;
        instance.set(VALUES_KEY, Map::new())?;
        self.run_from(turn, instance, 0, options).await
    }

    async fn continue_dialog(&self, turn: &mut TurnContext, instance: &mut DialogInstance) -> Result<DialogAction> {
        if !turn.activity.is_message() {
            return Ok(DialogAction::Wait);
        }
        if let Some(step) = instance.get::<InterruptedStep>(INTERRUPTED_KEY) {
            debug!(dialog_id = %self.id, index = step.index, "Re-running interrupted step");
            return self.run_from(turn, instance, step.index, step.input).await;
        }
        let text = Value::String(turn.activity.text.clone());
        self.resume(turn, instance, text).await
    }

    async fn resume(&self, turn: &mut TurnContext, instance: &mut DialogInstance, result: Value) -> Result<DialogAction> {
        let index = self.current_index(instance)?;
        self.run_from(turn, instance, index + 1, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use assert_matches::assert_matches;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::channels::RecordingAdapter;
    use crate::models::{Activity, ActivityType, ChannelAccount};
    use crate::state::{ConversationState, UserState};

    /// Records which steps ran; `stop_at` ends the dialog with `false` there
    struct Recorder {
        ran: Arc<Mutex<Vec<String>>>,
        stop_at: Option<&'static str>,
    }

    #[async_trait]
    impl Waterfall for Recorder {
        fn steps(&self) -> &'static [&'static str] {
            &["one", "two", "three"]
        }

        async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
            self.ran.lock().unwrap().push(step.to_string());
            if self.stop_at == Some(step) {
                return StepDirective::end(false);
            }
            let seen = ctx.take_result();
            ctx.set_value(step, &seen)?;
            Ok(StepDirective::Next(json!(format!("{}>{}", seen.as_str().unwrap_or(""), step))))
        }
    }

    fn turn() -> TurnContext {
        let activity = Activity::inbound(
            ActivityType::Message,
            "test",
            "c1",
            ChannelAccount::new("u1", None),
            ChannelAccount::new("bot", None),
        );
        TurnContext::new(
            activity,
            ConversationState::default(),
            UserState::default(),
            Arc::new(RecordingAdapter::new()),
            CancellationToken::new(),
        )
    }

    fn dialog(stop_at: Option<&'static str>) -> (WaterfallDialog<Recorder>, Arc<Mutex<Vec<String>>>) {
        let ran = Arc::new(Mutex::new(Vec::new()));
        (WaterfallDialog::new("recorder", Recorder { ran: ran.clone(), stop_at }), ran)
    }

    #[tokio::test]
    async fn test_next_threads_values_and_ends_after_last_step() {
        let (dialog, ran) = dialog(None);
        let mut turn = turn();
        let mut instance = DialogInstance::new("recorder");

        let action = dialog.begin(&mut turn, &mut instance, json!("opts")).await.unwrap();
        assert_eq!(action, DialogAction::End(json!("opts>one>two>three")));
        assert_eq!(*ran.lock().unwrap(), vec!["one", "two", "three"]);
        assert_eq!(instance.get::<usize>(STEP_INDEX_KEY), Some(2));
    }

    #[tokio::test]
    async fn test_end_skips_remaining_steps() {
        let (dialog, ran) = dialog(Some("two"));
        let mut turn = turn();
        let mut instance = DialogInstance::new("recorder");

        let action = dialog.begin(&mut turn, &mut instance, Value::Null).await.unwrap();
        assert_eq!(action, DialogAction::End(json!(false)));
        assert_eq!(*ran.lock().unwrap(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_resume_runs_following_step() {
        let (dialog, ran) = dialog(None);
        let mut turn = turn();
        let mut instance = DialogInstance::new("recorder");
        instance.set(STEP_INDEX_KEY, 1usize).unwrap();

        let action = dialog.resume(&mut turn, &mut instance, json!("child")).await.unwrap();
        assert_eq!(action, DialogAction::End(json!("child>three")));
        assert_eq!(*ran.lock().unwrap(), vec!["three"]);
    }

    #[tokio::test]
    async fn test_persisted_index_past_end_is_fatal() {
        let (dialog, _) = dialog(None);
        let mut turn = turn();
        let mut instance = DialogInstance::new("recorder");
        instance.set(STEP_INDEX_KEY, 3usize).unwrap();

        assert_matches!(
            dialog.resume(&mut turn, &mut instance, Value::Null).await,
            Err(AgentBuddyError::StepOutOfRange { index: 3, count: 3, .. })
        );
    }

    #[tokio::test]
    async fn test_step_values_persist_in_instance() {
        let (dialog, _) = dialog(None);
        let mut turn = turn();
        let mut instance = DialogInstance::new("recorder");
        dialog.begin(&mut turn, &mut instance, json!("x")).await.unwrap();

        assert_eq!(instance.get_value(VALUES_KEY).unwrap()["one"], json!("x"));
        assert_eq!(instance.get_value(OPTIONS_KEY), Some(&json!("x")));
    }

    /// Its second step fails until `broken` is cleared
    struct Fragile {
        broken: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Waterfall for Fragile {
        fn steps(&self) -> &'static [&'static str] {
            &["ask", "use"]
        }

        async fn run_step(&self, step: &str, ctx: &mut StepContext<'_>) -> Result<StepDirective> {
            if step == "use" && *self.broken.lock().unwrap() {
                return Err(AgentBuddyError::Channel("send failed".to_string()));
            }
            Ok(StepDirective::Next(ctx.take_result()))
        }
    }

    #[tokio::test]
    async fn test_failed_step_reruns_with_its_input() {
        let broken = Arc::new(Mutex::new(true));
        let dialog = WaterfallDialog::new("fragile", Fragile { broken: broken.clone() });
        let mut turn = turn();
        let mut instance = DialogInstance::new("fragile");
        instance.set(STEP_INDEX_KEY, 0usize).unwrap();

        assert_matches!(
            dialog.resume(&mut turn, &mut instance, json!("child")).await,
            Err(AgentBuddyError::Channel(_))
        );
        assert!(instance.get_value(INTERRUPTED_KEY).is_some());

        *broken.lock().unwrap() = false;
        turn.activity.text = "unrelated".to_string();
        let action = dialog.continue_dialog(&mut turn, &mut instance).await.unwrap();

        assert_eq!(action, DialogAction::End(json!("child")));
        assert!(instance.get_value(INTERRUPTED_KEY).is_none());
    }
}
