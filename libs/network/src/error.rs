//! Client Error Types
//!
//! One taxonomy for everything a caller of the session can see. Errors are
//! `Clone` because a single teardown fans the same reason out to every
//! pending waiter.

use codec::FramingError;
use thiserror::Error;
use types::SerializationError;

/// Main client error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Corrupt or oversized frame; the connection is unusable
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Socket-level failure while connecting, reading or writing
    #[error("Transport error during {operation}: {message}")]
    Transport {
        operation: String,
        message: String,
        kind: Option<std::io::ErrorKind>,
    },

    /// No response or connection within the allowed time
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// No live session, or the session ended while the call was outstanding
    #[error("Not connected")]
    NotConnected,

    /// Collector refused the presented credentials
    #[error("Authentication rejected: {reason}")]
    AuthRejected { reason: String },

    /// Collector answered with an error payload
    #[error("Server error {code}: {message}")]
    ServerError { code: i32, message: String },

    /// Collector answered with the wrong payload kind
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    /// Outbound envelope could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Connection establishment was cancelled by the caller
    #[error("Connect cancelled")]
    Cancelled,

    /// Operation not allowed in the current connection state
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState { operation: String, state: String },

    /// Settings could not be turned into a runnable client
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create a transport error from an I/O failure
    pub fn transport(operation: impl Into<String>, source: &std::io::Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: source.to_string(),
            kind: Some(source.kind()),
        }
    }

    /// Create a transport error without an underlying I/O error
    pub fn transport_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
            kind: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn auth_rejected(reason: impl Into<String>) -> Self {
        Self::AuthRejected {
            reason: reason.into(),
        }
    }

    pub fn server_error(code: i32, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    pub fn unexpected(expected: &'static str, actual: &'static str) -> Self {
        Self::UnexpectedResponse { expected, actual }
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether a caller-side retry could plausibly succeed
    ///
    /// Nothing inside the client retries; this only informs callers that
    /// run their own policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::Timeout { .. } | ClientError::NotConnected
        )
    }

    /// Whether the error ends the connection it occurred on
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            ClientError::Framing(_) | ClientError::Transport { .. }
        )
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Framing(_) => "framing",
            ClientError::Transport { .. } => "transport",
            ClientError::Timeout { .. } => "timeout",
            ClientError::NotConnected => "not_connected",
            ClientError::AuthRejected { .. } => "auth_rejected",
            ClientError::ServerError { .. } => "server_error",
            ClientError::UnexpectedResponse { .. } => "unexpected_response",
            ClientError::Serialization(_) => "serialization",
            ClientError::Cancelled => "cancelled",
            ClientError::InvalidState { .. } => "invalid_state",
            ClientError::Configuration { .. } => "configuration",
        }
    }
}
