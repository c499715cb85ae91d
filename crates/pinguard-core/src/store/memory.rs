//! In-memory credential store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::CredentialStore;
use crate::error::{PinError, Result};

/// Volatile store, used by tests and ephemeral sessions
///
/// Can be switched offline to simulate a locked keychain.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
    available: AtomicBool,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability; when unavailable every call fails with a storage error
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(PinError::Storage("secure storage unavailable".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| PinError::Storage("store lock poisoned".to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryCredentialStore::new();
        store.put("a/credential", "value").unwrap();
        assert_eq!(store.get("a/credential").unwrap().as_deref(), Some("value"));

        store.delete("a/credential").unwrap();
        assert!(store.get("a/credential").unwrap().is_none());

        // Deleting twice is fine
        store.delete("a/credential").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_unavailable_store_fails() {
        let store = MemoryCredentialStore::new();
        store.set_available(false);
        assert!(matches!(store.put("k", "v"), Err(PinError::Storage(_))));
        assert!(matches!(store.get("k"), Err(PinError::Storage(_))));

        store.set_available(true);
        assert!(store.put("k", "v").is_ok());
    }
}
