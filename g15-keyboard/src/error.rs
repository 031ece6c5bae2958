//! Keyboard interface error types

use g15_transport::TransportError;
use thiserror::Error;

/// Errors from keyboard operations
#[derive(Error, Debug)]
pub enum KeyboardError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Feature not available on the open device
    #[error("Feature not supported: {0}")]
    Unsupported(String),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device reported that no key data is available yet
    #[error("No key data available, try again")]
    TryAgain,

    /// Frame or buffer of the wrong size
    #[error("Invalid frame: expected {expected} bytes, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
}

impl KeyboardError {
    /// The session was lost and must be reopened
    pub fn is_device_gone(&self) -> bool {
        matches!(self, KeyboardError::Transport(e) if e.is_permanent())
    }

    /// The same call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            KeyboardError::Transport(e) => e.is_retryable(),
            KeyboardError::TryAgain => true,
            _ => false,
        }
    }
}
