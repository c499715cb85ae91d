//! Salted PIN digests
//!
//! SHA-256 over `pin || salt` is the default. Argon2id is available for
//! deployments that can afford the memory cost. Digests are always compared
//! in constant time.

use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{PinError, Result};

/// Salt length in bytes (256 bits)
pub const SALT_LENGTH: usize = 32;

/// Digest length in bytes for every supported algorithm
pub const DIGEST_LENGTH: usize = 32;

/// Digest algorithm recorded alongside each stored credential
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256(pin || salt)
    #[default]
    Sha256,
    /// Argon2id with default parameters, salt as the Argon2 salt
    Argon2id,
}

/// Generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Compute the digest of `pin` under `salt`
pub fn digest(
    algorithm: HashAlgorithm,
    pin: &str,
    salt: &[u8; SALT_LENGTH],
) -> Result<Zeroizing<[u8; DIGEST_LENGTH]>> {
    let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());
    let mut out = Zeroizing::new([0u8; DIGEST_LENGTH]);

    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(pin_bytes.as_slice());
            hasher.update(salt);
            out.copy_from_slice(&hasher.finalize());
        }
        HashAlgorithm::Argon2id => {
            Argon2::default()
                .hash_password_into(&pin_bytes, salt, &mut out[..])
                .map_err(|e| PinError::Crypto(format!("Failed to hash PIN: {}", e)))?;
        }
    }

    Ok(out)
}

/// Full-length constant-time comparison of two digests
pub fn digests_match(stored: &[u8], computed: &[u8]) -> bool {
    // ct_eq on slices of different length returns false without reading
    stored.ct_eq(computed).into()
}
