//! Pinguard Flow - interactive PIN flows
//!
//! Builds the user-facing flows on top of [`pinguard_core::PinAuthenticator`]:
//! - Digit-by-digit PIN entry with auto-submit
//! - Lockout countdown driven by a cancellable ticker
//! - Optional biometric bypass
//! - Forgot-PIN recovery against a remote reset-code service

pub mod biometric;
pub mod entry;
pub mod error;
pub mod events;
pub mod recovery;

pub use biometric::{BiometricAuthenticator, BiometricInfo, BiometricOutcome};
pub use entry::{EntryOutcome, EntryState, PinEntryFlow};
pub use error::{FlowError, Result};
pub use events::{EventReceiver, EventSender, FlowEvent};
pub use recovery::{
    HttpResetService, RecoveryContacts, RecoveryFlow, RecoveryMethod, RecoveryStep,
    ResetCodeService, RESET_CODE_LENGTH,
};
