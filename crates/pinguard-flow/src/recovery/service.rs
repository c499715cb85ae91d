//! Remote reset-code service contract
//!
//! The service owns the reset session. The core only sends requests and
//! consumes a boolean success with an optional server message.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::RecoveryMethod;
use crate::error::{FlowError, Result};

/// Path for requesting a delivery code
pub const SEND_CODE_PATH: &str = "/auth/pin-reset/send-code";

/// Path for completing the reset with a code and new PIN
pub const COMPLETE_PATH: &str = "/auth/pin-reset/complete";

/// Body of a send-code request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    pub user_id: String,
    pub method: RecoveryMethod,
    pub contact: String,
}

/// Body of a complete-reset request. Code and PIN are wiped on drop.
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResetRequest {
    pub user_id: String,
    pub code: String,
    pub new_pin: String,
    #[zeroize(skip)]
    pub method: RecoveryMethod,
}

impl fmt::Debug for CompleteResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompleteResetRequest")
            .field("user_id", &self.user_id)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// `{ success, error? }` response body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResetResponse {
    /// Map a failed response to [`FlowError::Remote`] with the server's message
    pub fn into_result(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(FlowError::Remote(
                self.error
                    .unwrap_or_else(|| "Request failed, please try again".to_string()),
            ))
        }
    }
}

/// First-party PIN reset service
#[async_trait]
pub trait ResetCodeService: Send + Sync {
    /// Deliver a reset code over the chosen channel
    async fn send_reset_code(&self, request: &SendCodeRequest) -> Result<()>;

    /// Redeem the code and register the new PIN server-side
    async fn complete_reset(&self, request: &CompleteResetRequest) -> Result<()>;
}
