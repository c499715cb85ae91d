//! Error types for the entry and recovery flows

use pinguard_core::PinError;
use thiserror::Error;

use crate::recovery::RecoveryMethod;

/// Result type alias for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors surfaced by the entry and recovery flows
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// Local PIN validation, verification, lockout or storage failure
    #[error(transparent)]
    Pin(#[from] PinError),

    /// The reset service rejected the request; message comes from the server
    #[error("{0}")]
    Remote(String),

    /// The reset service could not be reached
    #[error("Network error: {0}")]
    Transport(String),

    /// Operation not allowed in the current recovery step
    #[error("Cannot {action} during {step}")]
    InvalidTransition {
        action: &'static str,
        step: &'static str,
    },

    /// No contact on file for the chosen delivery channel
    #[error("No {0} on file for PIN recovery")]
    MethodUnavailable(RecoveryMethod),

    /// Delivery code has the wrong length
    #[error("Code must be {0} digits")]
    InvalidCode(usize),
}

impl FlowError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Pin(e) => e.user_message(),
            FlowError::Transport(_) => "Network error, please try again".to_string(),
            other => other.to_string(),
        }
    }
}
