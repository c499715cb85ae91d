#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use pinguard_core::{MemoryCredentialStore, PinAuthenticator, PinError};

const PIN: &str = "482913";

fuzz_target!(|data: &[u8]| {
    let candidate = String::from_utf8_lossy(data);

    let auth = PinAuthenticator::new(Arc::new(MemoryCredentialStore::new()));
    if auth.setup_pin("fuzz", PIN).is_err() {
        return;
    }

    match auth.verify_pin("fuzz", &candidate) {
        Ok(()) => assert_eq!(candidate, PIN),
        Err(PinError::IncorrectPin { remaining_attempts })
        | Err(PinError::InvalidFormat { remaining_attempts }) => {
            assert_ne!(candidate, PIN);
            assert_eq!(remaining_attempts, 4);
        }
        Err(other) => panic!("unexpected verification error: {:?}", other),
    }
});
