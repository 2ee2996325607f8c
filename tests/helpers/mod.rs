//! Test helpers module
//!
//! This module provides utilities and helpers for testing the AgentBuddy application.
//! It includes a scripted agent service, test data, and test context setup.

#![allow(dead_code)]

pub mod fake_agent;
pub mod test_context;
pub mod test_data;

pub use fake_agent::*;
pub use test_context::*;
pub use test_data::*;
