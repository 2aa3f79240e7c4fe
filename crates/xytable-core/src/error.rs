//! Error handling for the XY table console
//!
//! Provides error types for each failure class the console distinguishes:
//! - Connection errors (the request or link could not complete)
//! - Command errors (the backend answered and refused)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents transport-level failures talking to the control backend,
/// over either the HTTP API or the jog link.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// The request could not be delivered or no response arrived
    #[error("Transport error: {reason}")]
    Transport {
        /// The reason the transport failed.
        reason: String,
    },

    /// The request timed out
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// WebSocket error on the jog link
    #[error("WebSocket error: {reason}")]
    WebSocket {
        /// The reason for the WebSocket error.
        reason: String,
    },

    /// The backend URL could not be used
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Command error type
///
/// Represents a structured refusal from the backend, such as an
/// out-of-bounds move or a request while the hardware is offline.
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// The backend rejected the command
    #[error("{reason}")]
    Rejected {
        /// HTTP status code of the rejection.
        status: u16,
        /// The backend's reason text, verbatim.
        reason: String,
    },

    /// The backend answered with a body that could not be understood
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// What was wrong with the response.
        reason: String,
    },
}

/// Main error type for the console
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if the request never completed
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if the backend refused the command
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Command(CommandError::Rejected { .. }))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::Timeout { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_verbatim() {
        let err: Error = CommandError::Rejected {
            status: 400,
            reason: "Movement would exceed X axis limits (0 to 4.25 inches)".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Movement would exceed X axis limits (0 to 4.25 inches)"
        );
        assert!(err.is_rejection());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_classification() {
        let err: Error = ConnectionError::Timeout { timeout_ms: 5000 }.into();
        assert!(err.is_transport());
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Request timed out after 5000ms");
    }
}
