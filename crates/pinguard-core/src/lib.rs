//! Pinguard Core - local PIN security
//!
//! This crate provides the device-local half of PIN protection:
//! - Secure key/value credential storage
//! - Salted PIN digests with constant-time verification
//! - Attempt counting and timed lockout
//! - Setup, change, removal and emergency reset of the PIN

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

pub use auth::{
    validate_new_pin, validate_pin_format, AuthState, HashAlgorithm, LockoutPolicy,
    PinAuthenticator, SecurityStatus, PIN_LENGTH,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PinGuardConfig, ResetServiceConfig};
pub use error::{PinError, Result};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
