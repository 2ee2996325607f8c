//! Error handling for AgentBuddy
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.

use thiserror::Error;

/// Main error type for AgentBuddy
#[derive(Error, Debug)]
pub enum AgentBuddyError {
    #[error("Unknown dialog: {dialog_id}")]
    UnknownDialog { dialog_id: String },

    #[error("Dialog '{dialog_id}' has no step {index} (step count {count})")]
    StepOutOfRange { dialog_id: String, index: usize, count: usize },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Agent service error: {0}")]
    Agent(#[from] AgentError),

    #[error("No agent context for correlation id {correlation_id}")]
    StaleCorrelation { correlation_id: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Agent service specific errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent request failed: {0}")]
    RequestFailed(String),

    #[error("Agent request timeout")]
    Timeout,

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("Agent service unavailable")]
    ServiceUnavailable,

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
}

/// Result type alias for AgentBuddy operations
pub type Result<T> = std::result::Result<T, AgentBuddyError>;

/// Result type alias for agent service operations
pub type AgentResult<T> = std::result::Result<T, AgentError>;

impl AgentBuddyError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            AgentBuddyError::UnknownDialog { .. } => false,
            AgentBuddyError::StepOutOfRange { .. } => false,
            AgentBuddyError::InvalidStateTransition { .. } => false,
            AgentBuddyError::InvalidInput(_) => true,
            AgentBuddyError::MalformedPayload(_) => true,
            AgentBuddyError::Agent(_) => true,
            AgentBuddyError::StaleCorrelation { .. } => true,
            AgentBuddyError::Cancelled => true,
            AgentBuddyError::Channel(_) => true,
            AgentBuddyError::Config(_) => false,
            AgentBuddyError::Telegram(_) => true,
            AgentBuddyError::Redis(_) => true,
            AgentBuddyError::Http(_) => true,
            AgentBuddyError::Serialization(_) => false,
            AgentBuddyError::Base64(_) => true,
            AgentBuddyError::Utf8(_) => true,
            AgentBuddyError::Io(_) => true,
            AgentBuddyError::UrlParse(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AgentBuddyError::UnknownDialog { .. } => ErrorSeverity::Critical,
            AgentBuddyError::StepOutOfRange { .. } => ErrorSeverity::Critical,
            AgentBuddyError::Config(_) => ErrorSeverity::Critical,
            AgentBuddyError::InvalidInput(_) => ErrorSeverity::Info,
            AgentBuddyError::Cancelled => ErrorSeverity::Info,
            AgentBuddyError::MalformedPayload(_) => ErrorSeverity::Warning,
            AgentBuddyError::StaleCorrelation { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_fatal() {
        let err = AgentBuddyError::UnknownDialog { dialog_id: "missing".to_string() };
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.to_string(), "Unknown dialog: missing");
    }

    #[test]
    fn test_agent_errors_convert() {
        let err: AgentBuddyError = AgentError::Timeout.into();
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert_eq!(err.to_string(), "Agent service error: Agent request timeout");
    }
}
