//! PIN entry flow
//!
//! Buffers digits, auto-submits on the sixth, and translates authenticator
//! results into entry states and [`FlowEvent`]s. While locked out, input is
//! disabled and a once-per-second countdown task runs until the lockout ends.
//! The countdown task is aborted on [`PinEntryFlow::teardown`] and on drop.

use std::sync::Arc;
use std::time::Duration;

use pinguard_core::{AuthState, PinAuthenticator, PinError, PIN_LENGTH};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::biometric::BiometricAuthenticator;
use crate::error::Result;
use crate::events::{self, EventReceiver, EventSender, FlowEvent};

/// Countdown tick period
const TICK: Duration = Duration::from_secs(1);

/// Entry screen state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Accepting digits
    Entering,
    /// Input disabled until the deadline
    LockedOut { until: Instant },
    /// PIN or biometric accepted
    Unlocked,
}

/// What a single input produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Digit buffered; holds the new buffer length
    Pending(usize),
    /// Input accepted, flow may navigate onward
    Unlocked,
    /// Wrong or malformed PIN
    Rejected { remaining_attempts: Option<u32> },
    /// Lockout active or just entered
    LockedOut { remaining: Duration },
    /// Input dropped (not a digit, flow already unlocked)
    Ignored,
    /// No usable biometric on this device
    BiometricUnavailable,
    /// User dismissed the biometric prompt
    BiometricCancelled,
}

/// Digit-entry state machine over a [`PinAuthenticator`]
pub struct PinEntryFlow {
    authenticator: Arc<PinAuthenticator>,
    context: String,
    buffer: Zeroizing<String>,
    state: EntryState,
    failed_attempts: u32,
    biometric: Option<Arc<dyn BiometricAuthenticator>>,
    events: EventSender,
    countdown: Option<JoinHandle<()>>,
}

impl PinEntryFlow {
    /// Create a flow for `context`, returning the event receiver for the UI
    pub fn new(
        authenticator: Arc<PinAuthenticator>,
        context: impl Into<String>,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = events::channel();
        let flow = Self {
            authenticator,
            context: context.into(),
            buffer: Zeroizing::new(String::with_capacity(PIN_LENGTH)),
            state: EntryState::Entering,
            failed_attempts: 0,
            biometric: None,
            events,
            countdown: None,
        };
        (flow, receiver)
    }

    /// Offer the biometric path
    pub fn with_biometric(mut self, biometric: Arc<dyn BiometricAuthenticator>) -> Self {
        self.biometric = Some(biometric);
        self
    }

    /// Load the persisted state, resuming a lockout that is still running
    pub fn start(&mut self) -> Result<()> {
        let status = self.authenticator.security_status(&self.context)?;
        self.failed_attempts = status.failed_attempts;

        if let AuthState::LockedOut(_) = self.authenticator.auth_state(&self.context)? {
            self.enter_lockout(status.lockout_remaining());
        }
        Ok(())
    }

    /// Current state, with an elapsed lockout folded back into `Entering`
    pub fn state(&mut self) -> EntryState {
        self.expire_lockout_if_due();
        self.state
    }

    /// Number of digits entered so far
    pub fn entered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Failed attempts to display
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Whether digit keys should be enabled
    pub fn is_input_enabled(&mut self) -> bool {
        matches!(self.state(), EntryState::Entering)
    }

    /// Time left on the lockout
    pub fn lockout_remaining(&mut self) -> Option<Duration> {
        match self.state() {
            EntryState::LockedOut { until } => {
                Some(until.saturating_duration_since(Instant::now()))
            }
            _ => None,
        }
    }

    /// Enter one digit; the sixth submits the PIN for verification
    pub fn push_digit(&mut self, digit: char) -> Result<EntryOutcome> {
        match self.state() {
            EntryState::LockedOut { until } => {
                return Ok(EntryOutcome::LockedOut {
                    remaining: until.saturating_duration_since(Instant::now()),
                });
            }
            EntryState::Unlocked => return Ok(EntryOutcome::Ignored),
            EntryState::Entering => {}
        }

        if !digit.is_ascii_digit() || self.buffer.len() >= PIN_LENGTH {
            return Ok(EntryOutcome::Ignored);
        }

        self.buffer.push(digit);
        if self.buffer.len() < PIN_LENGTH {
            return Ok(EntryOutcome::Pending(self.buffer.len()));
        }

        self.submit()
    }

    /// Remove the last digit
    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Discard all entered digits
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try the biometric path. Never touches the failed-attempt counter.
    pub async fn authenticate_with_biometric(&mut self) -> Result<EntryOutcome> {
        let Some(biometric) = self.biometric.clone() else {
            self.emit(FlowEvent::BiometricUnavailable);
            return Ok(EntryOutcome::BiometricUnavailable);
        };

        let info = biometric.get_info().await;
        if !info.usable() {
            self.emit(FlowEvent::BiometricUnavailable);
            return Ok(EntryOutcome::BiometricUnavailable);
        }

        let outcome = biometric.authenticate().await;
        if outcome.success {
            info!(context = %self.context, method = %info.type_name, "unlocked with biometric");
            self.unlock();
            return Ok(EntryOutcome::Unlocked);
        }

        if outcome.cancelled {
            return Ok(EntryOutcome::BiometricCancelled);
        }

        self.emit(FlowEvent::Failure {
            message: outcome
                .error
                .unwrap_or_else(|| format!("{} not recognized", info.type_name)),
            remaining_attempts: None,
        });
        self.emit(FlowEvent::FailureFeedback);
        Ok(EntryOutcome::Rejected {
            remaining_attempts: None,
        })
    }

    /// Stop the countdown task; call when the screen goes away
    pub fn teardown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        self.buffer.clear();
    }

    fn submit(&mut self) -> Result<EntryOutcome> {
        let pin = Zeroizing::new(std::mem::take(&mut *self.buffer));
        let result = self.authenticator.verify_pin(&self.context, &pin);

        match result {
            Ok(()) => {
                self.unlock();
                Ok(EntryOutcome::Unlocked)
            }
            Err(PinError::LockedOut { remaining }) => {
                self.emit(FlowEvent::FailureFeedback);
                self.enter_lockout(remaining);
                Ok(EntryOutcome::LockedOut { remaining })
            }
            Err(err @ (PinError::IncorrectPin { .. } | PinError::InvalidFormat { .. })) => {
                let remaining_attempts = err.remaining_attempts();
                if let Some(remaining) = remaining_attempts {
                    self.failed_attempts = self
                        .authenticator
                        .policy()
                        .max_attempts
                        .saturating_sub(remaining);
                }
                self.reject(err.user_message(), remaining_attempts);
                Ok(EntryOutcome::Rejected { remaining_attempts })
            }
            Err(err) => {
                self.reject(err.user_message(), None);
                Err(err.into())
            }
        }
    }

    fn unlock(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        self.buffer.clear();
        self.failed_attempts = 0;
        self.state = EntryState::Unlocked;
        self.emit(FlowEvent::Success);
    }

    fn reject(&mut self, message: String, remaining_attempts: Option<u32>) {
        self.emit(FlowEvent::Failure {
            message,
            remaining_attempts,
        });
        self.emit(FlowEvent::FailureFeedback);
    }

    fn enter_lockout(&mut self, remaining: Duration) {
        let until = Instant::now() + remaining;
        self.buffer.clear();
        self.state = EntryState::LockedOut { until };
        self.emit(FlowEvent::LockedOut { remaining });
        debug!(context = %self.context, remaining_secs = remaining.as_secs(), "entry disabled");

        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }

        // Outside a runtime the state still expires lazily; only the ticks are lost
        if tokio::runtime::Handle::try_current().is_ok() {
            self.countdown = Some(tokio::spawn(run_countdown(until, self.events.clone())));
        }
    }

    fn expire_lockout_if_due(&mut self) {
        if let EntryState::LockedOut { until } = self.state {
            if Instant::now() >= until {
                self.state = EntryState::Entering;
                self.failed_attempts = 0;
                self.countdown = None;
            }
        }
    }

    fn emit(&self, event: FlowEvent) {
        // Receiver dropped means nobody is rendering; nothing to do
        let _ = self.events.send(event);
    }
}

impl Drop for PinEntryFlow {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Tick once per second until `until`, then announce expiry
async fn run_countdown(until: Instant, events: EventSender) {
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let _ = events.send(FlowEvent::LockoutExpired);
            break;
        }
        if events.send(FlowEvent::CountdownTick { remaining }).is_err() {
            break;
        }
    }
}
