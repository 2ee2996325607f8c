//! Dialog orchestration engine
//!
//! A conversation's active dialogs form a stack, innermost last. Each turn a
//! `DialogContext` continues the top dialog; dialogs answer with a
//! `DialogAction` that waits, pushes a child, or ends and hands a result to
//! the parent.

pub mod context;
pub mod instance;
pub mod prompts;
pub mod registry;
pub mod waterfall;

pub use context::DialogContext;
pub use instance::{DialogAction, DialogInstance, DialogStack, DialogTurnResult};
pub use prompts::{PromptDialog, PromptKind, PromptOptions, PromptPhase, PromptValidation};
pub use registry::{Dialog, DialogRegistry};
pub use waterfall::{StepContext, StepDirective, Waterfall, WaterfallDialog};
