//! End-to-end PIN lifecycle tests for Pinguard
//!
//! These tests drive the authenticator and flows over a file-backed store
//! in a temporary directory, reopening the store between steps the way a
//! restarted process would.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pinguard_core::{AuthState, FileCredentialStore, ManualClock, PinAuthenticator, PinError};
use pinguard_flow::{
    recovery::{CompleteResetRequest, SendCodeRequest},
    EntryOutcome, FlowError, PinEntryFlow, RecoveryContacts, RecoveryFlow, RecoveryMethod,
    RecoveryStep, ResetCodeService,
};
use tempfile::TempDir;

const CTX: &str = "user-42";

fn open(path: &Path, clock: &Arc<ManualClock>) -> PinAuthenticator {
    let store = FileCredentialStore::open(path).unwrap();
    PinAuthenticator::new(Arc::new(store)).with_clock(clock.clone())
}

/// Reset service that accepts everything and records what it saw
#[derive(Default)]
struct AcceptingService {
    sent: Mutex<Vec<SendCodeRequest>>,
    completed: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ResetCodeService for AcceptingService {
    async fn send_reset_code(&self, request: &SendCodeRequest) -> pinguard_flow::Result<()> {
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn complete_reset(&self, request: &CompleteResetRequest) -> pinguard_flow::Result<()> {
        if request.code != "246810" {
            return Err(FlowError::Remote("Invalid or expired code".to_string()));
        }
        self.completed
            .lock()
            .unwrap()
            .push((request.user_id.clone(), request.new_pin.clone()));
        Ok(())
    }
}

/// Five wrong PINs lock the context; the lockout survives a restart and lifts after 30 minutes
#[test]
fn test_lockout_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let clock = Arc::new(ManualClock::starting_now());

    // ==========================================
    // STEP 1: Set up and exhaust attempts
    // ==========================================
    {
        let auth = open(&path, &clock);
        auth.setup_pin(CTX, "482913").unwrap();

        for expected in [4, 3, 2, 1] {
            assert_eq!(
                auth.verify_pin(CTX, "111111"),
                Err(PinError::IncorrectPin {
                    remaining_attempts: expected
                })
            );
        }

        assert_eq!(
            auth.verify_pin(CTX, "111111"),
            Err(PinError::LockedOut {
                remaining: Duration::from_secs(30 * 60)
            })
        );

        // Correct PIN is refused while locked out
        let err = auth.verify_pin(CTX, "482913").unwrap_err();
        assert!(err.is_locked_out());
    }

    // ==========================================
    // STEP 2: Restart ten minutes later
    // ==========================================
    clock.advance(chrono::Duration::minutes(10));
    {
        let auth = open(&path, &clock);
        assert!(matches!(auth.auth_state(CTX).unwrap(), AuthState::LockedOut(_)));

        let status = auth.security_status(CTX).unwrap();
        assert!(status.pin_setup);
        assert!(status.is_locked_out);
        assert_eq!(status.lockout_remaining(), Duration::from_secs(20 * 60));

        assert_eq!(
            auth.verify_pin(CTX, "482913").unwrap_err().remaining_time(),
            Some(Duration::from_secs(20 * 60))
        );
    }

    // ==========================================
    // STEP 3: Lockout elapses
    // ==========================================
    clock.advance(chrono::Duration::minutes(20));
    {
        let auth = open(&path, &clock);
        assert_eq!(auth.auth_state(CTX).unwrap(), AuthState::RequiresPin);
        auth.verify_pin(CTX, "482913").unwrap();

        let status = auth.security_status(CTX).unwrap();
        assert_eq!(status.failed_attempts, 0);
        assert_eq!(status.remaining_attempts, 5);
    }
}

/// Setup, change and removal each persist across reopen
#[test]
fn test_credential_lifecycle_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let clock = Arc::new(ManualClock::starting_now());

    {
        let auth = open(&path, &clock);
        assert_eq!(auth.auth_state(CTX).unwrap(), AuthState::SetupRequired);
        auth.setup_pin(CTX, "482913").unwrap();
    }

    {
        let auth = open(&path, &clock);
        assert!(auth.is_pin_setup(CTX).unwrap());
        auth.verify_pin(CTX, "482913").unwrap();
        auth.change_pin(CTX, "482913", "705318").unwrap();
    }

    {
        let auth = open(&path, &clock);
        assert!(matches!(
            auth.verify_pin(CTX, "482913"),
            Err(PinError::IncorrectPin { .. })
        ));
        auth.verify_pin(CTX, "705318").unwrap();
        auth.remove_pin(CTX, "705318").unwrap();
    }

    {
        let auth = open(&path, &clock);
        assert!(!auth.is_pin_setup(CTX).unwrap());
        assert_eq!(auth.verify_pin(CTX, "705318"), Err(PinError::PinNotSetUp));
        assert_eq!(auth.security_status(CTX).unwrap().failed_attempts, 0);
    }
}

/// Contexts sharing one store file do not affect each other
#[test]
fn test_contexts_share_file_independently() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let clock = Arc::new(ManualClock::starting_now());

    {
        let auth = open(&path, &clock);
        auth.setup_pin("alice", "482913").unwrap();
        auth.setup_pin("bob", "705318").unwrap();
        for _ in 0..5 {
            let _ = auth.verify_pin("alice", "111111");
        }
    }

    let auth = open(&path, &clock);
    assert!(auth.verify_pin("alice", "482913").unwrap_err().is_locked_out());
    auth.verify_pin("bob", "705318").unwrap();
    assert!(matches!(
        auth.verify_pin("bob", "482913"),
        Err(PinError::IncorrectPin {
            remaining_attempts: 4
        })
    ));
}

/// A locked-out user recovers through the reset service and unlocks with the new PIN
#[tokio::test]
async fn test_recovery_after_lockout_then_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let clock = Arc::new(ManualClock::starting_now());

    let auth = Arc::new(open(&path, &clock));
    auth.setup_pin(CTX, "482913").unwrap();
    for _ in 0..5 {
        let _ = auth.verify_pin(CTX, "111111");
    }
    assert!(matches!(auth.auth_state(CTX).unwrap(), AuthState::LockedOut(_)));

    // ==========================================
    // STEP 1: Forgot-PIN flow
    // ==========================================
    let service = Arc::new(AcceptingService::default());
    let contacts = RecoveryContacts {
        phone: None,
        email: Some("jane@example.com".to_string()),
    };
    let mut recovery = RecoveryFlow::new(auth.clone(), service.clone(), CTX, contacts);

    recovery.begin().unwrap();
    recovery.select_method(RecoveryMethod::Email).unwrap();
    assert_eq!(recovery.masked_contact().as_deref(), Some("j***@example.com"));
    recovery.send_code().await.unwrap();

    // A wrong code is rejected by the server only when the new PIN is submitted
    recovery.submit_code("999999").unwrap();
    let err = recovery.submit_new_pin("705318", "705318").await.unwrap_err();
    assert!(matches!(err, FlowError::Remote(_)));
    assert_eq!(recovery.last_error(), Some("Invalid or expired code"));
    assert_eq!(
        recovery.step(),
        RecoveryStep::SetNewPin {
            method: RecoveryMethod::Email
        }
    );

    recovery.cancel();
    recovery.begin().unwrap();
    recovery.select_method(RecoveryMethod::Email).unwrap();
    recovery.send_code().await.unwrap();
    recovery.submit_code("246810").unwrap();
    recovery.submit_new_pin("705318", "705318").await.unwrap();
    assert_eq!(recovery.step(), RecoveryStep::Done);

    assert_eq!(service.sent.lock().unwrap().len(), 2);
    assert_eq!(
        service.completed.lock().unwrap().as_slice(),
        &[(CTX.to_string(), "705318".to_string())]
    );

    // ==========================================
    // STEP 2: New PIN works after restart, lockout is gone
    // ==========================================
    drop(recovery);
    drop(auth);

    let auth = Arc::new(open(&path, &clock));
    assert_eq!(auth.auth_state(CTX).unwrap(), AuthState::RequiresPin);

    let (mut entry, _events) = PinEntryFlow::new(auth.clone(), CTX);
    entry.start().unwrap();
    let mut outcome = EntryOutcome::Ignored;
    for digit in "705318".chars() {
        outcome = entry.push_digit(digit).unwrap();
    }
    assert_eq!(outcome, EntryOutcome::Unlocked);

    assert!(matches!(
        auth.verify_pin(CTX, "482913"),
        Err(PinError::IncorrectPin { .. })
    ));
}

/// Entry flow resumes a persisted lockout and keeps input disabled
#[tokio::test]
async fn test_entry_flow_resumes_persisted_lockout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let clock = Arc::new(ManualClock::starting_now());

    {
        let auth = open(&path, &clock);
        auth.setup_pin(CTX, "482913").unwrap();
        for _ in 0..5 {
            let _ = auth.verify_pin(CTX, "000001");
        }
    }

    let auth = Arc::new(open(&path, &clock));
    let (mut entry, _events) = PinEntryFlow::new(auth, CTX);
    entry.start().unwrap();

    assert!(!entry.is_input_enabled());
    assert!(entry.lockout_remaining().is_some());
    assert!(matches!(
        entry.push_digit('4').unwrap(),
        EntryOutcome::LockedOut { .. }
    ));
    entry.teardown();
}
