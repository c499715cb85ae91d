//! Lockout policy for failed PIN attempts
//!
//! After `max_attempts` consecutive failures the context is locked for
//! `lockout_duration`. The counter restarts from zero once the lockout
//! is entered.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Consecutive failures allowed before lockout
pub const MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (30 minutes)
pub const LOCKOUT_DURATION: Duration = Duration::from_secs(30 * 60);

/// Lockout policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutPolicy {
    /// Failures before lockout, never less than one
    #[serde(deserialize_with = "at_least_one")]
    pub max_attempts: u32,
    /// Lockout length in seconds
    pub lockout_duration_secs: u64,
}

fn at_least_one<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u32::deserialize(deserializer)?.max(1))
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            lockout_duration_secs: LOCKOUT_DURATION.as_secs(),
        }
    }
}

impl LockoutPolicy {
    /// Create a custom policy
    pub fn custom(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout_duration_secs: lockout_duration.as_secs(),
        }
    }

    /// Fewer attempts, longer lockout
    pub fn strict() -> Self {
        Self::custom(3, Duration::from_secs(60 * 60))
    }

    /// More attempts, shorter lockout
    pub fn lenient() -> Self {
        Self::custom(10, Duration::from_secs(5 * 60))
    }

    /// Lockout length
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }

    /// Whether this many consecutive failures triggers a lockout
    pub fn should_lock(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }

    /// Attempts left before lockout
    pub fn remaining_attempts(&self, failed_attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(failed_attempts)
    }

    /// Human-readable lockout remaining time
    pub fn describe(remaining: Duration) -> String {
        let secs = remaining.as_secs();
        if secs < 60 {
            format!("{} seconds", secs)
        } else if secs < 3600 {
            format!("{} minutes", secs.div_ceil(60))
        } else {
            format!("{} hours", secs.div_ceil(3600))
        }
    }

    /// Format remaining time as MM:SS for countdown displays
    pub fn countdown(remaining: Duration) -> String {
        let secs = remaining.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
