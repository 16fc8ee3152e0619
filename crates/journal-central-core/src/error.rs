//! Error types for the journal shipping agent

use std::collections::BTreeMap;

use thiserror::Error;

/// Main error type for agent operations
///
/// Every variant is terminal for the operation that produced it; nothing is
/// retried internally.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing invocation inputs or a failed supervisor query
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Journal query failed
    #[error("Journal query error: {0}")]
    Query(String),

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network or connection failure talking to the central service
    #[error("Transport error: {0}")]
    Transport(String),

    /// Central service rejected the request with a decodable error body
    #[error("Request rejected ({status}): {message}")]
    Application {
        status: u16,
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    /// Central service answered with a body that is not the expected shape
    #[error("Unexpected response ({status}): {reason}; body: {body}")]
    Protocol {
        status: u16,
        body: String,
        reason: String,
    },

    /// Bearer credential missing, unreadable or unwritable
    #[error("Credential error: {0}")]
    Credential(String),

    /// Machine identifier could not be read
    #[error("Device identity error: {0}")]
    DeviceIdentity(String),

    /// Invalid agent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AgentError
pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    /// Create a resolution error
    pub fn resolution(message: impl Into<String>) -> Self {
        AgentError::Resolution(message.into())
    }

    /// Create a journal query error
    pub fn query(message: impl Into<String>) -> Self {
        AgentError::Query(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        AgentError::Transport(message.into())
    }

    /// Create a credential error
    pub fn credential(message: impl Into<String>) -> Self {
        AgentError::Credential(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AgentError::Config(message.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AgentError::Config(_) => 2,
            AgentError::Resolution(_) => 3,
            AgentError::Query(_) => 4,
            AgentError::Credential(_) => 5,
            AgentError::DeviceIdentity(_) => 6,
            AgentError::Serialization(_) => 7,
            AgentError::Transport(_) => 10,
            AgentError::Application { .. } => 11,
            AgentError::Protocol { .. } => 12,
            AgentError::Io(_) => 20,
        }
    }
}
