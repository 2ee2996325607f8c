//! Utility modules
//! 
//! This module contains common utilities used throughout the application,
//! including error handling, logging setup, and the invitation link codec.

pub mod errors;
pub mod logging;
pub mod invitation;

pub use errors::{AgentBuddyError, AgentError, Result};
