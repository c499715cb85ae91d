//! Events emitted by the PIN entry flow

use std::time::Duration;

use tokio::sync::mpsc;

/// Signals for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// PIN or biometric accepted
    Success,
    /// Entry rejected
    Failure {
        message: String,
        remaining_attempts: Option<u32>,
    },
    /// Vibrate / shake
    FailureFeedback,
    /// Input disabled for the given time
    LockedOut { remaining: Duration },
    /// Once per second while locked out
    CountdownTick { remaining: Duration },
    /// Input re-enabled
    LockoutExpired,
    /// Biometric path not available on this device or not enrolled
    BiometricUnavailable,
}

/// Sender half handed to the flow
pub type EventSender = mpsc::UnboundedSender<FlowEvent>;

/// Receiver half handed to the presentation layer
pub type EventReceiver = mpsc::UnboundedReceiver<FlowEvent>;

/// Create a connected event channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
