//! HTTP client for the reset-code service

use std::time::Duration;

use async_trait::async_trait;
use pinguard_core::ResetServiceConfig;
use serde::Serialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::service::{
    CompleteResetRequest, ResetCodeService, ResetResponse, SendCodeRequest, COMPLETE_PATH,
    SEND_CODE_PATH,
};
use crate::error::{FlowError, Result};

/// Blocking `ureq` client driven from a blocking task
#[derive(Clone)]
pub struct HttpResetService {
    agent: ureq::Agent,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpResetService {
    /// Build a client from configuration
    pub fn new(config: &ResetServiceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.request_timeout_ms))
            .timeout_write(Duration::from_millis(config.request_timeout_ms))
            .build();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    /// Full URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let payload = Zeroizing::new(
            serde_json::to_string(body).map_err(|e| FlowError::Transport(e.to_string()))?,
        );

        let mut request = self
            .agent
            .post(&self.endpoint(path))
            .set("content-type", "application/json");
        if let Some(token) = self.bearer_token.as_ref() {
            request = request.set("authorization", &format!("Bearer {}", token));
        }

        match request.send_string(&payload) {
            Ok(response) => {
                debug!(path, status = response.status(), "reset service responded");
                parse_response(response)?.into_result()
            }
            Err(ureq::Error::Status(code, response)) => {
                warn!(path, status = code, "reset service rejected request");
                // First-party service: prefer its own error message when it sent one
                match parse_response(response) {
                    Ok(body) if !body.success => body.into_result(),
                    _ => Err(FlowError::Remote(format!(
                        "Request failed with status {}",
                        code
                    ))),
                }
            }
            Err(ureq::Error::Transport(err)) => Err(FlowError::Transport(err.to_string())),
        }
    }

    async fn post_blocking<T>(&self, path: &'static str, body: T) -> Result<()>
    where
        T: Serialize + Send + 'static,
    {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.post(path, &body))
            .await
            .map_err(|e| FlowError::Transport(format!("request task failed: {}", e)))?
    }
}

fn parse_response(response: ureq::Response) -> Result<ResetResponse> {
    response
        .into_json::<ResetResponse>()
        .map_err(|e| FlowError::Transport(format!("invalid response body: {}", e)))
}

#[async_trait]
impl ResetCodeService for HttpResetService {
    async fn send_reset_code(&self, request: &SendCodeRequest) -> Result<()> {
        self.post_blocking(SEND_CODE_PATH, request.clone()).await
    }

    async fn complete_reset(&self, request: &CompleteResetRequest) -> Result<()> {
        self.post_blocking(COMPLETE_PATH, request.clone()).await
    }
}
