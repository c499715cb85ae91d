//! Error types for PIN credential operations
//!
//! No variant carries PIN material. Counters and durations are the only
//! payloads that leave this crate.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, PinError>;

/// Errors that can occur while managing or verifying a PIN
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PinError {
    /// PIN is not exactly the required number of characters
    #[error("PIN must be exactly {0} digits")]
    InvalidLength(usize),

    /// PIN contains something other than ASCII digits
    #[error("PIN must contain only digits")]
    NonDigit,

    /// PIN is on the weak-PIN denylist
    #[error("weak PIN")]
    WeakPin,

    /// New PIN and its confirmation differ
    #[error("PINs do not match")]
    PinMismatch,

    /// No credential stored for this context
    #[error("PIN not set up")]
    PinNotSetUp,

    /// Wrong PIN, attempt consumed
    #[error("Incorrect PIN ({remaining_attempts} attempts remaining)")]
    IncorrectPin { remaining_attempts: u32 },

    /// Malformed PIN submitted for verification, attempt consumed
    #[error("Invalid PIN format ({remaining_attempts} attempts remaining)")]
    InvalidFormat { remaining_attempts: u32 },

    /// Too many failed attempts
    #[error("Too many failed attempts, locked for {} seconds", remaining.as_secs())]
    LockedOut { remaining: Duration },

    /// Secure storage unavailable or write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Hash back-end failure
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl PinError {
    /// Whether this failure is an active lockout
    pub fn is_locked_out(&self) -> bool {
        matches!(self, PinError::LockedOut { .. })
    }

    /// Remaining attempts before lockout, when the failure consumed one
    pub fn remaining_attempts(&self) -> Option<u32> {
        match self {
            PinError::IncorrectPin { remaining_attempts }
            | PinError::InvalidFormat { remaining_attempts } => Some(*remaining_attempts),
            _ => None,
        }
    }

    /// Time left on the lockout, if locked out
    pub fn remaining_time(&self) -> Option<Duration> {
        match self {
            PinError::LockedOut { remaining } => Some(*remaining),
            _ => None,
        }
    }

    /// Bad input shape (length, digits, denylist, confirmation)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PinError::InvalidLength(_)
                | PinError::NonDigit
                | PinError::WeakPin
                | PinError::PinMismatch
        )
    }

    /// Message suitable for showing to the user.
    ///
    /// Storage and crypto failures collapse to a generic retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            PinError::Storage(_) | PinError::Crypto(_) => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for PinError {
    fn from(e: std::io::Error) -> Self {
        PinError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for PinError {
    fn from(e: serde_json::Error) -> Self {
        PinError::Storage(format!("Serialization error: {}", e))
    }
}
