//! PIN authentication
//!
//! # Security Model
//!
//! - PIN is stored as a salted digest (SHA-256 by default, Argon2id optional)
//! - Salt is 256 random bits, regenerated on every setup
//! - Digests are compared in constant time
//! - Consecutive failures lead to a timed lockout
//! - No PIN, digest or salt ever appears in logs or errors

mod hash;
mod lockout;
mod pin;
mod records;
mod validate;

pub use hash::{HashAlgorithm, DIGEST_LENGTH, SALT_LENGTH};
pub use lockout::{LockoutPolicy, LOCKOUT_DURATION, MAX_ATTEMPTS};
pub use pin::PinAuthenticator;
pub use validate::{
    is_weak_pin, validate_new_pin, validate_pin_format, validate_pin_shape, PIN_LENGTH, WEAK_PINS,
};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Authentication state for a context
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    /// PIN needs to be set up (first run)
    SetupRequired,
    /// PIN required for authentication
    RequiresPin,
    /// Verification refused until the specified time
    LockedOut(DateTime<Utc>),
}

/// Read-only view of a context's security state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatus {
    /// Whether a PIN is stored
    pub pin_setup: bool,
    /// Consecutive failed attempts
    pub failed_attempts: u32,
    /// Attempts left before lockout
    pub remaining_attempts: u32,
    /// Whether verification is currently refused
    pub is_locked_out: bool,
    /// Milliseconds until the lockout ends, zero when not locked out
    #[serde(rename = "lockoutRemainingTime")]
    pub lockout_remaining_ms: u64,
}

impl SecurityStatus {
    /// Time until the lockout ends
    pub fn lockout_remaining(&self) -> Duration {
        Duration::from_millis(self.lockout_remaining_ms)
    }
}
