//! Forgot-PIN recovery flow
//!
//! ```text
//! Idle -> SelectMethod -> ConfirmSend -> AwaitCode -> SetNewPin -> Done
//!   ^_______________________ cancel() from any step ______________|
//! ```
//!
//! Steps only move forward across network calls. A failed remote call keeps
//! the flow on its current step with the server's message in
//! [`RecoveryFlow::last_error`].

mod http;
mod service;

pub use http::HttpResetService;
pub use service::{
    CompleteResetRequest, ResetCodeService, ResetResponse, SendCodeRequest, COMPLETE_PATH,
    SEND_CODE_PATH,
};

use std::fmt;
use std::sync::Arc;

use pinguard_core::{validate_new_pin, PinAuthenticator, PinError, PIN_LENGTH};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::error::{FlowError, Result};

/// Length of the delivered reset code
pub const RESET_CODE_LENGTH: usize = PIN_LENGTH;

/// Delivery channel for the reset code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMethod {
    Phone,
    Email,
}

impl fmt::Display for RecoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryMethod::Phone => write!(f, "phone number"),
            RecoveryMethod::Email => write!(f, "email address"),
        }
    }
}

/// Contacts on file for the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryContacts {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl RecoveryContacts {
    /// Contact for a channel
    pub fn contact(&self, method: RecoveryMethod) -> Option<&str> {
        match method {
            RecoveryMethod::Phone => self.phone.as_deref(),
            RecoveryMethod::Email => self.email.as_deref(),
        }
        .filter(|c| !c.trim().is_empty())
    }

    /// Channels with a contact on file
    pub fn available_methods(&self) -> Vec<RecoveryMethod> {
        [RecoveryMethod::Phone, RecoveryMethod::Email]
            .into_iter()
            .filter(|m| self.contact(*m).is_some())
            .collect()
    }

    /// Contact with the middle obscured, for the confirm step
    pub fn masked(&self, method: RecoveryMethod) -> Option<String> {
        let contact = self.contact(method)?;
        Some(match method {
            RecoveryMethod::Phone => mask_phone(contact),
            RecoveryMethod::Email => mask_email(contact),
        })
    }
}

fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let keep_tail = 4.min(chars.len());
    let keep_head = if chars.first() == Some(&'+') {
        2.min(chars.len() - keep_tail)
    } else {
        0
    };

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i < keep_head || i >= chars.len() - keep_tail {
                *c
            } else {
                '*'
            }
        })
        .collect()
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

/// Recovery step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    Idle,
    SelectMethod,
    ConfirmSend { method: RecoveryMethod },
    AwaitCode { method: RecoveryMethod },
    SetNewPin { method: RecoveryMethod },
    Done,
}

impl RecoveryStep {
    fn name(&self) -> &'static str {
        match self {
            RecoveryStep::Idle => "idle",
            RecoveryStep::SelectMethod => "method selection",
            RecoveryStep::ConfirmSend { .. } => "send confirmation",
            RecoveryStep::AwaitCode { .. } => "code entry",
            RecoveryStep::SetNewPin { .. } => "new PIN entry",
            RecoveryStep::Done => "completion",
        }
    }
}

/// Forgot-PIN state machine
pub struct RecoveryFlow {
    authenticator: Arc<PinAuthenticator>,
    service: Arc<dyn ResetCodeService>,
    user_id: String,
    contacts: RecoveryContacts,
    step: RecoveryStep,
    code: Option<Zeroizing<String>>,
    /// PIN the service accepted for this session, pending the local re-key
    accepted_pin: Option<Zeroizing<String>>,
    last_error: Option<String>,
}

impl RecoveryFlow {
    /// Create an idle recovery flow for `user_id`; the same id scopes the local credential
    pub fn new(
        authenticator: Arc<PinAuthenticator>,
        service: Arc<dyn ResetCodeService>,
        user_id: impl Into<String>,
        contacts: RecoveryContacts,
    ) -> Self {
        Self {
            authenticator,
            service,
            user_id: user_id.into(),
            contacts,
            step: RecoveryStep::Idle,
            code: None,
            accepted_pin: None,
            last_error: None,
        }
    }

    /// Current step
    pub fn step(&self) -> RecoveryStep {
        self.step
    }

    /// Message from the last failed action, cleared on the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Contacts on file
    pub fn contacts(&self) -> &RecoveryContacts {
        &self.contacts
    }

    /// Masked contact for the chosen method, once one is chosen
    pub fn masked_contact(&self) -> Option<String> {
        self.method().and_then(|m| self.contacts.masked(m))
    }

    /// Open the flow at method selection
    pub fn begin(&mut self) -> Result<()> {
        match self.step {
            RecoveryStep::Idle | RecoveryStep::Done => {
                self.reset_session();
                self.step = RecoveryStep::SelectMethod;
                Ok(())
            }
            other => Err(invalid("begin recovery", other)),
        }
    }

    /// Choose the delivery channel
    pub fn select_method(&mut self, method: RecoveryMethod) -> Result<()> {
        if !matches!(
            self.step,
            RecoveryStep::SelectMethod | RecoveryStep::ConfirmSend { .. }
        ) {
            return Err(invalid("choose a delivery method", self.step));
        }

        if self.contacts.contact(method).is_none() {
            return self.fail(FlowError::MethodUnavailable(method));
        }

        self.last_error = None;
        self.step = RecoveryStep::ConfirmSend { method };
        Ok(())
    }

    /// Return from send confirmation to method selection; no network call has happened yet
    pub fn back(&mut self) -> Result<()> {
        match self.step {
            RecoveryStep::ConfirmSend { .. } => {
                self.last_error = None;
                self.step = RecoveryStep::SelectMethod;
                Ok(())
            }
            other => Err(invalid("go back", other)),
        }
    }

    /// Ask the service to deliver a code
    pub async fn send_code(&mut self) -> Result<()> {
        let method = match self.step {
            RecoveryStep::ConfirmSend { method } => method,
            other => return Err(invalid("send a code", other)),
        };

        self.request_code(method).await?;
        self.step = RecoveryStep::AwaitCode { method };
        Ok(())
    }

    /// Ask for another code while waiting for one
    pub async fn resend_code(&mut self) -> Result<()> {
        match self.step {
            RecoveryStep::AwaitCode { method } => self.request_code(method).await,
            other => Err(invalid("resend a code", other)),
        }
    }

    /// Accept the delivered code; only its length is checked locally
    pub fn submit_code(&mut self, code: &str) -> Result<()> {
        let method = match self.step {
            RecoveryStep::AwaitCode { method } => method,
            other => return Err(invalid("enter a code", other)),
        };

        let code = code.trim();
        if code.chars().count() != RESET_CODE_LENGTH {
            return self.fail(FlowError::InvalidCode(RESET_CODE_LENGTH));
        }

        self.code = Some(Zeroizing::new(code.to_string()));
        self.last_error = None;
        self.step = RecoveryStep::SetNewPin { method };
        Ok(())
    }

    /// Submit the new PIN with its confirmation, then re-key local storage
    pub async fn submit_new_pin(&mut self, new_pin: &str, confirmation: &str) -> Result<()> {
        let method = match self.step {
            RecoveryStep::SetNewPin { method } => method,
            other => return Err(invalid("set a new PIN", other)),
        };

        if let Err(e) = validate_new_pin(new_pin, confirmation) {
            return self.fail(e.into());
        }

        // After the service accepted a PIN, only that PIN may be stored locally
        let accepted_mismatch = self.accepted_pin.as_ref().map(|p| p.as_str() != new_pin);
        if accepted_mismatch == Some(true) {
            return self.fail(PinError::PinMismatch.into());
        }

        if accepted_mismatch.is_none() {
            let code = self
                .code
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default();
            let request = CompleteResetRequest {
                user_id: self.user_id.clone(),
                code,
                new_pin: new_pin.to_string(),
                method,
            };

            if let Err(e) = self.service.complete_reset(&request).await {
                warn!(user = %self.user_id, "PIN reset rejected by service");
                return self.fail(e);
            }
            self.accepted_pin = Some(Zeroizing::new(new_pin.to_string()));
        }

        // Remote already accepted; a local failure here is retried without another remote call
        if let Err(e) = self.authenticator.setup_pin(&self.user_id, new_pin) {
            return self.fail(e.into());
        }

        info!(user = %self.user_id, ?method, "PIN reset completed");
        self.reset_session();
        self.step = RecoveryStep::Done;
        Ok(())
    }

    /// Abandon the flow from any step
    pub fn cancel(&mut self) {
        self.reset_session();
        self.step = RecoveryStep::Idle;
    }

    fn method(&self) -> Option<RecoveryMethod> {
        match self.step {
            RecoveryStep::ConfirmSend { method }
            | RecoveryStep::AwaitCode { method }
            | RecoveryStep::SetNewPin { method } => Some(method),
            _ => None,
        }
    }

    async fn request_code(&mut self, method: RecoveryMethod) -> Result<()> {
        let contact = match self.contacts.contact(method) {
            Some(contact) => contact.to_string(),
            None => return self.fail(FlowError::MethodUnavailable(method)),
        };

        let request = SendCodeRequest {
            user_id: self.user_id.clone(),
            method,
            contact,
        };

        match self.service.send_reset_code(&request).await {
            Ok(()) => {
                info!(user = %self.user_id, ?method, "reset code sent");
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!(user = %self.user_id, ?method, "reset code delivery failed");
                self.fail(e)
            }
        }
    }

    fn fail(&mut self, error: FlowError) -> Result<()> {
        self.last_error = Some(error.user_message());
        Err(error)
    }

    fn reset_session(&mut self) {
        self.code = None;
        self.accepted_pin = None;
        self.last_error = None;
    }
}

fn invalid(action: &'static str, step: RecoveryStep) -> FlowError {
    FlowError::InvalidTransition {
        action,
        step: step.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pinguard_core::{MemoryCredentialStore, PinError};
    use std::sync::Mutex;

    const USER: &str = "user-42";

    /// Scripted reset service
    #[derive(Default)]
    struct FakeService {
        send_failures: Mutex<Vec<FlowError>>,
        complete_failures: Mutex<Vec<FlowError>>,
        sent: Mutex<Vec<SendCodeRequest>>,
        completed: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ResetCodeService for FakeService {
        async fn send_reset_code(&self, request: &SendCodeRequest) -> Result<()> {
            if let Some(err) = self.send_failures.lock().unwrap().pop() {
                return Err(err);
            }
            self.sent.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn complete_reset(&self, request: &CompleteResetRequest) -> Result<()> {
            if let Some(err) = self.complete_failures.lock().unwrap().pop() {
                return Err(err);
            }
            self.completed
                .lock()
                .unwrap()
                .push((request.code.clone(), request.new_pin.clone()));
            Ok(())
        }
    }

    fn contacts() -> RecoveryContacts {
        RecoveryContacts {
            phone: Some("+15551234567".to_string()),
            email: Some("jane@example.com".to_string()),
        }
    }

    fn setup() -> (
        RecoveryFlow,
        Arc<PinAuthenticator>,
        Arc<FakeService>,
        Arc<MemoryCredentialStore>,
    ) {
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = Arc::new(PinAuthenticator::new(store.clone()));
        auth.setup_pin(USER, "482913").unwrap();
        let service = Arc::new(FakeService::default());
        let flow = RecoveryFlow::new(auth.clone(), service.clone(), USER, contacts());
        (flow, auth, service, store)
    }

    #[tokio::test]
    async fn test_happy_path_rekeys_local_pin() {
        let (mut flow, auth, service, _) = setup();

        flow.begin().unwrap();
        flow.select_method(RecoveryMethod::Email).unwrap();
        assert_eq!(flow.masked_contact().as_deref(), Some("j***@example.com"));

        flow.send_code().await.unwrap();
        assert_eq!(
            flow.step(),
            RecoveryStep::AwaitCode {
                method: RecoveryMethod::Email
            }
        );
        assert_eq!(service.sent.lock().unwrap()[0].contact, "jane@example.com");

        flow.submit_code("918273").unwrap();
        flow.submit_new_pin("735204", "735204").await.unwrap();

        assert_eq!(flow.step(), RecoveryStep::Done);
        assert_eq!(
            service.completed.lock().unwrap()[0],
            ("918273".to_string(), "735204".to_string())
        );
        auth.verify_pin(USER, "735204").unwrap();
        assert!(auth.verify_pin(USER, "482913").is_err());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_step_and_message() {
        let (mut flow, _, service, _) = setup();
        service
            .send_failures
            .lock()
            .unwrap()
            .push(FlowError::Remote("Too many requests".to_string()));

        flow.begin().unwrap();
        flow.select_method(RecoveryMethod::Phone).unwrap();
        assert!(flow.send_code().await.is_err());

        assert_eq!(
            flow.step(),
            RecoveryStep::ConfirmSend {
                method: RecoveryMethod::Phone
            }
        );
        assert_eq!(flow.last_error(), Some("Too many requests"));

        // Retrying from the same step works and clears the message
        flow.send_code().await.unwrap();
        assert!(flow.last_error().is_none());
    }

    #[tokio::test]
    async fn test_complete_failure_stays_on_new_pin_step() {
        let (mut flow, auth, service, _) = setup();
        service
            .complete_failures
            .lock()
            .unwrap()
            .push(FlowError::Remote("Invalid or expired code".to_string()));

        flow.begin().unwrap();
        flow.select_method(RecoveryMethod::Email).unwrap();
        flow.send_code().await.unwrap();
        flow.submit_code("000001").unwrap();

        assert!(flow.submit_new_pin("735204", "735204").await.is_err());
        assert_eq!(
            flow.step(),
            RecoveryStep::SetNewPin {
                method: RecoveryMethod::Email
            }
        );
        assert_eq!(flow.last_error(), Some("Invalid or expired code"));

        // Local credential untouched
        auth.verify_pin(USER, "482913").unwrap();
    }

    #[tokio::test]
    async fn test_local_failure_after_remote_success_is_retried_locally() {
        let (mut flow, auth, service, store) = setup();

        flow.begin().unwrap();
        flow.select_method(RecoveryMethod::Email).unwrap();
        flow.send_code().await.unwrap();
        flow.submit_code("918273").unwrap();

        store.set_available(false);
        let err = flow.submit_new_pin("735204", "735204").await.unwrap_err();
        assert!(matches!(err, FlowError::Pin(PinError::Storage(_))));
        assert_eq!(
            flow.last_error(),
            Some("Something went wrong, please try again")
        );

        store.set_available(true);
        flow.submit_new_pin("735204", "735204").await.unwrap();
        assert_eq!(service.completed.lock().unwrap().len(), 1);
        auth.verify_pin(USER, "735204").unwrap();
    }

    #[tokio::test]
    async fn test_local_retry_refuses_pin_the_service_never_saw() {
        let (mut flow, auth, service, store) = setup();

        flow.begin().unwrap();
        flow.select_method(RecoveryMethod::Email).unwrap();
        flow.send_code().await.unwrap();
        flow.submit_code("918273").unwrap();

        store.set_available(false);
        assert!(flow.submit_new_pin("735204", "735204").await.is_err());
        store.set_available(true);

        let err = flow.submit_new_pin("608142", "608142").await.unwrap_err();
        assert!(matches!(err, FlowError::Pin(PinError::PinMismatch)));
        assert_eq!(
            flow.step(),
            RecoveryStep::SetNewPin {
                method: RecoveryMethod::Email
            }
        );
        assert!(auth.verify_pin(USER, "608142").is_err());

        flow.submit_new_pin("735204", "735204").await.unwrap();
        assert_eq!(flow.step(), RecoveryStep::Done);
        assert_eq!(
            service.completed.lock().unwrap().as_slice(),
            &[("918273".to_string(), "735204".to_string())]
        );
        auth.verify_pin(USER, "735204").unwrap();
    }

    #[tokio::test]
    async fn test_local_validation_before_remote() {
        let (mut flow, _, service, _) = setup();

        flow.begin().unwrap();
        flow.select_method(RecoveryMethod::Email).unwrap();
        flow.send_code().await.unwrap();

        assert!(matches!(
            flow.submit_code("123"),
            Err(FlowError::InvalidCode(6))
        ));
        flow.submit_code("918273").unwrap();

        assert!(matches!(
            flow.submit_new_pin("735204", "735205").await,
            Err(FlowError::Pin(PinError::PinMismatch))
        ));
        assert!(matches!(
            flow.submit_new_pin("123456", "123456").await,
            Err(FlowError::Pin(PinError::WeakPin))
        ));
        assert!(service.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transitions_are_enforced() {
        let (mut flow, _, _, _) = setup();

        assert!(matches!(
            flow.send_code().await,
            Err(FlowError::InvalidTransition { .. })
        ));
        assert!(flow.submit_code("918273").is_err());

        flow.begin().unwrap();
        assert!(flow.begin().is_err());

        flow.select_method(RecoveryMethod::Phone).unwrap();
        flow.back().unwrap();
        assert_eq!(flow.step(), RecoveryStep::SelectMethod);

        flow.select_method(RecoveryMethod::Phone).unwrap();
        flow.send_code().await.unwrap();

        // No backward step once a code has been sent
        assert!(flow.back().is_err());
        assert!(flow.select_method(RecoveryMethod::Email).is_err());
        flow.resend_code().await.unwrap();

        flow.cancel();
        assert_eq!(flow.step(), RecoveryStep::Idle);
    }

    #[tokio::test]
    async fn test_missing_contact() {
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = Arc::new(PinAuthenticator::new(store));
        let mut flow = RecoveryFlow::new(
            auth,
            Arc::new(FakeService::default()),
            USER,
            RecoveryContacts {
                phone: None,
                email: Some("jane@example.com".to_string()),
            },
        );

        flow.begin().unwrap();
        assert!(matches!(
            flow.select_method(RecoveryMethod::Phone),
            Err(FlowError::MethodUnavailable(RecoveryMethod::Phone))
        ));
        assert_eq!(flow.step(), RecoveryStep::SelectMethod);
        assert_eq!(flow.contacts().available_methods(), vec![RecoveryMethod::Email]);
    }

    #[test]
    fn test_masking() {
        let contacts = contacts();
        assert_eq!(
            contacts.masked(RecoveryMethod::Phone).as_deref(),
            Some("+1******4567")
        );
        assert_eq!(
            contacts.masked(RecoveryMethod::Email).as_deref(),
            Some("j***@example.com")
        );
        assert_eq!(mask_phone("123"), "123");
    }
}
