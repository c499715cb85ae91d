#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use pinguard_core::store::{scoped_key, CredentialStore};
use pinguard_core::{MemoryCredentialStore, PinAuthenticator};

fuzz_target!(|data: &[u8]| {
    // Split the input between the two persisted records
    let split = data.first().map(|b| *b as usize).unwrap_or(0).min(data.len());
    let (credential, attempts) = data.split_at(split);

    let store = Arc::new(MemoryCredentialStore::new());
    let _ = store.put(
        &scoped_key("fuzz", "credential"),
        &String::from_utf8_lossy(credential),
    );
    let _ = store.put(&scoped_key("fuzz", "attempts"), &String::from_utf8_lossy(attempts));

    // Corrupt records must surface as errors, never panics
    let auth = PinAuthenticator::new(store);
    let _ = auth.auth_state("fuzz");
    let _ = auth.security_status("fuzz");
    let _ = auth.verify_pin("fuzz", "482913");
});
