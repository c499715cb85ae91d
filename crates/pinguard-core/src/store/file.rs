//! File-backed credential store
//!
//! All entries live in a single JSON document. Every mutation rewrites the
//! document through a temp file and a rename so a crash never leaves a
//! half-written credential behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CredentialStore;
use crate::error::{PinError, Result};

/// On-disk document format
#[derive(Serialize, Deserialize, Default)]
struct StoreDocument {
    /// Version for future migrations
    version: u32,
    /// Scoped key -> serialized record
    entries: BTreeMap<String, String>,
}

const DOCUMENT_VERSION: u32 = 1;

/// Credential store persisted to a JSON file with owner-only permissions
pub struct FileCredentialStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCredentialStore {
    /// Open the store at `path`, loading existing entries if the file exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let document: StoreDocument = serde_json::from_str(&contents).map_err(|e| {
                PinError::Storage(format!("Failed to parse credential store: {}", e))
            })?;
            if document.version > DOCUMENT_VERSION {
                return Err(PinError::Storage(format!(
                    "Unsupported credential store version {}",
                    document.version
                )));
            }
            document.entries
        } else {
            BTreeMap::new()
        };

        debug!(path = ?path, entries = entries.len(), "opened credential store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PinError::Storage("store lock poisoned".to_string()))?;

        // Persist a modified copy first so a failed write leaves memory untouched
        let mut next = entries.clone();
        apply(&mut next);
        self.write(&next)?;
        *entries = next;
        Ok(())
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let document = StoreDocument {
            version: DOCUMENT_VERSION,
            entries: entries.clone(),
        };
        let contents = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PinError::Storage("store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        {
            let entries = self
                .entries
                .lock()
                .map_err(|_| PinError::Storage("store lock poisoned".to_string()))?;
            if !entries.contains_key(key) {
                return Ok(());
            }
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("credentials.json");

        let store = FileCredentialStore::open(&path).unwrap();
        store.put("alice/credential", "{\"x\":1}").unwrap();
        drop(store);

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("alice/credential").unwrap().as_deref(),
            Some("{\"x\":1}")
        );
    }

    #[test]
    fn test_delete_persists() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("credentials.json");

        let store = FileCredentialStore::open(&path).unwrap();
        store.put("k", "v").unwrap();
        store.delete("k").unwrap();
        store.delete("missing").unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert!(reopened.get("k").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileCredentialStore::open(&path),
            Err(PinError::Storage(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("credentials.json");
        let store = FileCredentialStore::open(&path).unwrap();
        store.put("k", "v").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
