//! Biometric authenticator collaborator
//!
//! Gates an alternate success path only. It never stores or replaces the PIN
//! and never touches the failed-attempt counter.

use async_trait::async_trait;

/// Device biometric capability
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BiometricInfo {
    /// Hardware present
    pub available: bool,
    /// User enrolled and opted in
    pub is_setup: bool,
    /// Display name, e.g. "Face ID" or "Fingerprint"
    pub type_name: String,
}

impl BiometricInfo {
    /// Whether a challenge can be presented
    pub fn usable(&self) -> bool {
        self.available && self.is_setup
    }
}

/// Result of a biometric challenge
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BiometricOutcome {
    pub success: bool,
    /// User dismissed the prompt
    pub cancelled: bool,
    pub error: Option<String>,
}

impl BiometricOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Platform biometric prompt
#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    /// Capability and enrollment state
    async fn get_info(&self) -> BiometricInfo;

    /// Present the challenge
    async fn authenticate(&self) -> BiometricOutcome;
}
