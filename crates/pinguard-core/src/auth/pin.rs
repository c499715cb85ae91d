//! PIN lifecycle and lockout enforcement
//!
//! [`PinAuthenticator`] is the only component that reads or writes the
//! credential and attempt records. Each call takes the context (user or
//! device id) it operates on, and read-modify-write cycles for one context
//! are serialized through a per-context lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::hash::{self, HashAlgorithm};
use super::lockout::LockoutPolicy;
use super::records::{AttemptState, StoredCredential, ATTEMPTS_RECORD, CREDENTIAL_RECORD};
use super::validate::{validate_pin_format, validate_pin_shape};
use super::{AuthState, SecurityStatus};
use crate::clock::{Clock, SystemClock};
use crate::config::PinGuardConfig;
use crate::error::{PinError, Result};
use crate::store::{scoped_key, CredentialStore};

/// Current credential format version
const CREDENTIAL_VERSION: u32 = 1;

/// Why a verification attempt failed before or at the comparison gate
#[derive(Clone, Copy)]
enum FailedGate {
    Format,
    Mismatch,
}

/// PIN authenticator over an injected credential store
pub struct PinAuthenticator {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
    algorithm: HashAlgorithm,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PinAuthenticator {
    /// Create an authenticator with the default policy, SHA-256 and the system clock
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy: LockoutPolicy::default(),
            algorithm: HashAlgorithm::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create an authenticator configured from `config`
    pub fn from_config(config: &PinGuardConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self::new(store)
            .with_policy(config.lockout.clone())
            .with_algorithm(config.hash_algorithm)
    }

    /// Use a custom clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom lockout policy
    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Digest algorithm for newly stored PINs
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Active lockout policy
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Check if a PIN has been set for `context`
    pub fn is_pin_setup(&self, context: &str) -> Result<bool> {
        Ok(self.load_credential(context)?.is_some())
    }

    /// Store a new PIN, replacing any existing one and clearing lockout state
    pub fn setup_pin(&self, context: &str, pin: &str) -> Result<()> {
        let lock = self.context_lock(context)?;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.setup_locked(context, pin)
    }

    /// Verify a PIN against the stored credential
    ///
    /// Gates are evaluated in order: active lockout, credential present,
    /// PIN shape, digest comparison. Shape and comparison failures both
    /// consume an attempt.
    pub fn verify_pin(&self, context: &str, pin: &str) -> Result<()> {
        let lock = self.context_lock(context)?;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.verify_locked(context, pin)
    }

    /// Replace the PIN after verifying the current one
    ///
    /// The new PIN is validated before the old one is checked, so a
    /// rejected new PIN never consumes an attempt.
    pub fn change_pin(&self, context: &str, old_pin: &str, new_pin: &str) -> Result<()> {
        validate_pin_format(new_pin)?;

        let lock = self.context_lock(context)?;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        self.verify_locked(context, old_pin)?;
        self.setup_locked(context, new_pin)?;

        info!(context = %context, "PIN changed");
        Ok(())
    }

    /// Remove the PIN after verifying it
    pub fn remove_pin(&self, context: &str, pin: &str) -> Result<()> {
        let lock = self.context_lock(context)?;
        {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            self.verify_locked(context, pin)?;
            self.delete_records(context)?;
        }
        self.release_context_lock(context, lock);

        info!(context = %context, "PIN removed");
        Ok(())
    }

    /// Unconditionally delete all records for `context`
    ///
    /// Bypasses verification. Only reachable from privileged tooling.
    pub fn emergency_reset(&self, context: &str) -> Result<()> {
        let lock = self.context_lock(context)?;
        {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            self.delete_records(context)?;
        }
        self.release_context_lock(context, lock);

        warn!(context = %context, "emergency reset: PIN credential and attempt state deleted");
        Ok(())
    }

    /// Read-only projection of the security state
    ///
    /// An expired lockout is reported as cleared without being written back.
    pub fn security_status(&self, context: &str) -> Result<SecurityStatus> {
        let now = self.clock.now();
        let pin_setup = self.is_pin_setup(context)?;
        let attempts = self.load_attempts(context)?;

        let status = match attempts.lockout_until {
            Some(until) if now < until => SecurityStatus {
                pin_setup,
                failed_attempts: attempts.failed_count,
                remaining_attempts: 0,
                is_locked_out: true,
                lockout_remaining_ms: remaining_between(now, until).as_millis() as u64,
            },
            Some(_) => SecurityStatus {
                pin_setup,
                failed_attempts: 0,
                remaining_attempts: self.policy.max_attempts,
                is_locked_out: false,
                lockout_remaining_ms: 0,
            },
            None => SecurityStatus {
                pin_setup,
                failed_attempts: attempts.failed_count,
                remaining_attempts: self.policy.remaining_attempts(attempts.failed_count),
                is_locked_out: false,
                lockout_remaining_ms: 0,
            },
        };

        Ok(status)
    }

    /// Coarse authentication state for driving entry screens
    pub fn auth_state(&self, context: &str) -> Result<AuthState> {
        if !self.is_pin_setup(context)? {
            return Ok(AuthState::SetupRequired);
        }

        let attempts = self.load_attempts(context)?;
        match attempts.active_lockout(self.clock.now()) {
            Some(until) => Ok(AuthState::LockedOut(until)),
            None => Ok(AuthState::RequiresPin),
        }
    }

    fn setup_locked(&self, context: &str, pin: &str) -> Result<()> {
        validate_pin_format(pin)?;

        let salt = hash::generate_salt();
        let digest = hash::digest(self.algorithm, pin, &salt)?;

        let credential = StoredCredential {
            pin_hash: *digest,
            salt,
            algorithm: self.algorithm,
            created_at: self.clock.now(),
            version: CREDENTIAL_VERSION,
        };

        // Credential last: until it lands the previous PIN stays active
        self.save_attempts(context, &AttemptState::default())?;
        self.save_credential(context, &credential)?;

        info!(context = %context, algorithm = ?self.algorithm, "PIN set up");
        Ok(())
    }

    fn verify_locked(&self, context: &str, pin: &str) -> Result<()> {
        let now = self.clock.now();
        let mut attempts = self.load_attempts(context)?;

        // Lockout gate
        if let Some(until) = attempts.lockout_until {
            if now < until {
                let remaining = remaining_between(now, until);
                debug!(
                    context = %context,
                    remaining_secs = remaining.as_secs(),
                    "verification refused while locked out"
                );
                return Err(PinError::LockedOut { remaining });
            }

            attempts = AttemptState::default();
            self.save_attempts(context, &attempts)?;
            info!(context = %context, "lockout expired");
        }

        let credential = self
            .load_credential(context)?
            .ok_or(PinError::PinNotSetUp)?;

        // Format gate
        if validate_pin_shape(pin).is_err() {
            return Err(self.record_failure(context, attempts, now, FailedGate::Format)?);
        }

        // Comparison gate
        let computed = hash::digest(credential.algorithm, pin, &credential.salt)?;
        if hash::digests_match(&credential.pin_hash, computed.as_slice()) {
            if attempts != AttemptState::default() {
                self.save_attempts(context, &AttemptState::default())?;
            }
            debug!(context = %context, "PIN verified");
            Ok(())
        } else {
            Err(self.record_failure(context, attempts, now, FailedGate::Mismatch)?)
        }
    }

    /// Count a failed attempt and produce the error to return
    fn record_failure(
        &self,
        context: &str,
        mut attempts: AttemptState,
        now: DateTime<Utc>,
        gate: FailedGate,
    ) -> Result<PinError> {
        attempts.failed_count = attempts.failed_count.saturating_add(1);
        attempts.last_failed_at = Some(now);

        if self.policy.should_lock(attempts.failed_count) {
            let duration = self.policy.lockout_duration();
            attempts.failed_count = 0;
            attempts.lockout_until = Some(lockout_deadline(now, duration));
            self.save_attempts(context, &attempts)?;

            warn!(
                context = %context,
                lockout = %LockoutPolicy::describe(duration),
                "too many failed PIN attempts, locking out"
            );
            return Ok(PinError::LockedOut {
                remaining: duration,
            });
        }

        self.save_attempts(context, &attempts)?;

        let remaining_attempts = self.policy.remaining_attempts(attempts.failed_count);
        debug!(
            context = %context,
            failed = attempts.failed_count,
            remaining_attempts,
            "failed PIN attempt"
        );

        Ok(match gate {
            FailedGate::Format => PinError::InvalidFormat { remaining_attempts },
            FailedGate::Mismatch => PinError::IncorrectPin { remaining_attempts },
        })
    }

    fn context_lock(&self, context: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| PinError::Storage("context lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(context.to_string()).or_default()))
    }

    /// Drop the lock entry of a context whose records are gone
    ///
    /// Handles are only cloned under the table lock, so a count of two (table
    /// plus `lock`) means no other caller holds or waits on it.
    fn release_context_lock(&self, context: &str, lock: Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            if Arc::strong_count(&lock) == 2 {
                locks.remove(context);
            }
        }
    }

    #[cfg(test)]
    fn tracked_contexts(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn load_credential(&self, context: &str) -> Result<Option<StoredCredential>> {
        match self.store.get(&scoped_key(context, CREDENTIAL_RECORD))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_credential(&self, context: &str, credential: &StoredCredential) -> Result<()> {
        let raw = zeroize::Zeroizing::new(serde_json::to_string(credential)?);
        self.store.put(&scoped_key(context, CREDENTIAL_RECORD), raw.as_str())
    }

    fn load_attempts(&self, context: &str) -> Result<AttemptState> {
        match self.store.get(&scoped_key(context, ATTEMPTS_RECORD))? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(AttemptState::default()),
        }
    }

    fn save_attempts(&self, context: &str, attempts: &AttemptState) -> Result<()> {
        let raw = serde_json::to_string(attempts)?;
        self.store.put(&scoped_key(context, ATTEMPTS_RECORD), &raw)
    }

    /// Attempts first, so a partial failure never leaves attempt state without a credential
    fn delete_records(&self, context: &str) -> Result<()> {
        self.store.delete(&scoped_key(context, ATTEMPTS_RECORD))?;
        self.store.delete(&scoped_key(context, CREDENTIAL_RECORD))
    }
}

fn remaining_between(now: DateTime<Utc>, until: DateTime<Utc>) -> Duration {
    (until - now).to_std().unwrap_or(Duration::ZERO)
}

fn lockout_deadline(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
