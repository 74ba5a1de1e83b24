//! Error types for casegen.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message surfaced to the caller when the transport fails.
///
/// Transport details are logged, never shown: the caller only needs to know
/// that retrying is worthwhile.
pub const TRANSPORT_RETRY_PROMPT: &str =
    "Connection to the generation service was lost. Please try again.";

/// A shared error type for the whole casegen workspace.
///
/// Variants follow the taxonomy of the document pipeline: validation problems
/// are reported before any network call, protocol problems are logged and
/// skipped by the decoder, producer and transport problems terminate the
/// owning generation session.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CasegenError {
    /// Missing or invalid caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed frame on the response stream
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Explicit error frame sent by the producer
    #[error("{0}")]
    Producer(String),

    /// Network failure, timeout or truncated stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A generation session is already running for this document
    #[error("A generation session is already active for {0}")]
    SessionBusy(String),

    /// Session method called in the wrong lifecycle state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Data access error (history backend)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CasegenError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Creates a Producer error
    pub fn producer(message: impl Into<String>) -> Self {
        Self::Producer(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a Transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns the message the caller should see for this error.
    ///
    /// Producer messages are passed through verbatim, transport failures are
    /// replaced by a generic retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            Self::Producer(message) => message.clone(),
            Self::Transport(_) => TRANSPORT_RETRY_PROMPT.to_string(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for CasegenError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CasegenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CasegenError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for CasegenError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, CasegenError>`.
pub type Result<T> = std::result::Result<T, CasegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_transport_details() {
        let err = CasegenError::transport("connection reset by peer (os error 104)");
        assert_eq!(err.user_message(), TRANSPORT_RETRY_PROMPT);
        assert!(err.is_transport());
    }

    #[test]
    fn test_user_message_passes_producer_text_verbatim() {
        let err = CasegenError::producer("API rate limit exceeded. Please try again later.");
        assert_eq!(
            err.user_message(),
            "API rate limit exceeded. Please try again later."
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = CasegenError::not_found("version", "abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity not found: version 'abc'");
    }
}
