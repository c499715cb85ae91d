//! Secure key/value persistence for credential records
//!
//! The store is a pure persistence boundary: it never inspects values.
//! Record keys are scoped per context with [`scoped_key`].

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use crate::error::Result;

/// Scoped string key/value access to device-local secure storage
pub trait CredentialStore: Send + Sync {
    /// Store a value, replacing any previous one
    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Fetch a value, `None` when absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove a value; removing an absent key is not an error
    fn delete(&self, key: &str) -> Result<()>;
}

/// Build the storage key for a record belonging to `context`
pub fn scoped_key(context: &str, record: &str) -> String {
    format!("{}/{}", context, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_keys_are_distinct_per_context() {
        assert_ne!(scoped_key("alice", "credential"), scoped_key("bob", "credential"));
        assert_eq!(scoped_key("alice", "attempts"), "alice/attempts");
    }
}
