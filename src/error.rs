//! # Error Types
//!
//! Custom error types for Teleop Link using `thiserror`.
//!
//! The connection manager handles the three transport variants identically:
//! the session is torn down and the watchdog retries.

use thiserror::Error;

/// Main error type for Teleop Link
#[derive(Debug, Error)]
pub enum LinkError {
    /// Opening the control channel failed (refused, unreachable, timed out)
    #[error("Failed to open transport to {target}: {reason}")]
    TransportOpenFailure { target: String, reason: String },

    /// The open control channel reported an error
    #[error("Transport error: {0}")]
    TransportRuntimeError(String),

    /// The control channel is closed
    #[error("Transport closed")]
    TransportClosed,

    /// Input device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Returns true for the errors that end a session.
    ///
    /// # Examples
    ///
    /// ```
    /// use teleop_link::error::LinkError;
    ///
    /// assert!(LinkError::TransportClosed.is_transport());
    /// assert!(!LinkError::Controller("gone".into()).is_transport());
    /// ```
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LinkError::TransportOpenFailure { .. }
                | LinkError::TransportRuntimeError(_)
                | LinkError::TransportClosed
        )
    }
}

/// Result type alias for Teleop Link
pub type Result<T> = std::result::Result<T, LinkError>;
