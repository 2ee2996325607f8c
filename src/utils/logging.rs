//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the AgentBuddy application.

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::LoggingConfig;
use crate::utils::errors::{AgentBuddyError, Result};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file writer on drop; the host must keep it
/// alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "agentbuddy.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(non_blocking))
        .try_init()
        .map_err(|e| AgentBuddyError::Config(format!("Failed to install subscriber: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log an inbound turn
pub fn log_turn(conversation_id: &str, activity_type: &str, text: Option<&str>) {
    info!(
        conversation_id = conversation_id,
        activity_type = activity_type,
        text = text,
        "Turn received"
    );
}

/// Log a dialog stack transition
pub fn log_dialog_transition(conversation_id: &str, dialog_id: &str, transition: &str, depth: usize) {
    debug!(
        conversation_id = conversation_id,
        dialog_id = dialog_id,
        transition = transition,
        depth = depth,
        "Dialog transition"
    );
}

/// Log an event published on the bus
pub fn log_event_published(kind: &str, correlation_id: &str, delivered: usize) {
    debug!(
        kind = kind,
        correlation_id = correlation_id,
        delivered = delivered,
        "Event published"
    );
}

/// Log the outcome of a conversation resumption
pub fn log_resumption(conversation_id: &str, correlation_id: &str, success: bool, details: Option<&str>) {
    if success {
        info!(
            conversation_id = conversation_id,
            correlation_id = correlation_id,
            "Conversation resumed"
        );
    } else {
        warn!(
            conversation_id = conversation_id,
            correlation_id = correlation_id,
            details = details,
            "Conversation resumption dropped"
        );
    }
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
