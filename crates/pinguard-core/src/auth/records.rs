//! Persisted credential and attempt records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::hash::{HashAlgorithm, DIGEST_LENGTH, SALT_LENGTH};

/// Record name for the credential under a context
pub(crate) const CREDENTIAL_RECORD: &str = "credential";
/// Record name for the attempt state under a context
pub(crate) const ATTEMPTS_RECORD: &str = "attempts";

/// Stored PIN credential. Hash and salt are always written together.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct StoredCredential {
    /// Digest of pin || salt
    #[serde(with = "hex_array")]
    pub pin_hash: [u8; DIGEST_LENGTH],
    /// Per-credential random salt
    #[serde(with = "hex_array")]
    pub salt: [u8; SALT_LENGTH],
    /// Algorithm that produced `pin_hash`
    #[zeroize(skip)]
    pub algorithm: HashAlgorithm,
    /// When the PIN was set
    #[zeroize(skip)]
    pub created_at: DateTime<Utc>,
    /// Version for future migrations
    pub version: u32,
}

/// Failed-attempt bookkeeping
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub(crate) struct AttemptState {
    /// Consecutive failures since the last success or lockout
    pub failed_count: u32,
    /// Verification refused until this instant
    pub lockout_until: Option<DateTime<Utc>>,
    /// Most recent failure
    pub last_failed_at: Option<DateTime<Utc>>,
}

impl AttemptState {
    /// Lockout deadline if still in the future at `now`
    pub fn active_lockout(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lockout_until.filter(|until| now < *until)
    }
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid byte length"))
    }
}
