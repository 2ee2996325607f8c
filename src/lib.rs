//! AgentBuddy Telegram Bot
//!
//! A conversational bot that provisions identity agents for its users and
//! walks them through creating and accepting connection invitations.
//! This library provides the dialog engine, a replaying event bus, state
//! storage, the agent service client and the Telegram channel adapter.

#![allow(non_snake_case)]

pub mod config;
pub mod handlers;
pub mod services;
pub mod models;
pub mod state;
pub mod dialogs;
pub mod events;
pub mod channels;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{AgentBuddyError, Result};

// Re-export main components for easy access
pub use channels::{ChannelAdapter, TelegramAdapter};
pub use dialogs::{DialogContext, DialogRegistry, DialogTurnResult};
pub use events::{Event, EventBus, MessageKind};
pub use handlers::AgentBot;
pub use services::ServiceFactory;
pub use state::{StateAccessors, TurnContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
