//! Error handling for the rgo language client

use thiserror::Error;

/// Error type shared by every rgo crate
///
/// Each variant maps to one failure class the user can see. Malformed server
/// notifications have no variant: the router logs and drops them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RgoError {
    /// A required environment variable or setting is missing or invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An external install command failed or could not be interpreted
    #[error("Install failed: {message}")]
    Install { message: String },

    /// The language server connection never reached the running state
    #[error("Language server handshake failed: {message}")]
    Handshake { message: String },

    /// A lifecycle operation was invoked from a state that does not allow it
    #[error("Cannot {operation} while the language client is {state}")]
    InvalidState { operation: String, state: String },

    /// The connection failed after it was established
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RgoError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new install error
    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
        }
    }

    /// Create a new handshake error
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Create a new invalid state error
    pub fn invalid_state(operation: impl Into<String>, state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    /// Create a new transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether this error is a configuration problem rather than a runtime failure
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias for convenience
pub type RgoResult<T> = Result<T, RgoError>;
