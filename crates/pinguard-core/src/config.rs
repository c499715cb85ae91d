//! Configuration persistence
//!
//! A single JSON document covers the credential store location, lockout
//! policy, digest algorithm and the remote reset service.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{HashAlgorithm, LockoutPolicy};
use crate::error::{PinError, Result};

/// Application directory name under the platform config/data dirs
const APP_DIR_NAME: &str = "pinguard";

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Credential store file name
const STORE_FILE_NAME: &str = "credentials.json";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinGuardConfig {
    /// Path of the file-backed credential store
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Lockout policy
    #[serde(default)]
    pub lockout: LockoutPolicy,

    /// Digest algorithm for newly stored PINs
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Remote reset-code service
    #[serde(default)]
    pub reset_service: ResetServiceConfig,
}

/// Remote PIN-reset service endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetServiceConfig {
    /// Base URL, e.g. `https://api.example.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read/write timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional bearer token sent with every request
    #[serde(default)]
    pub bearer_token: Option<String>,
}

fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(STORE_FILE_NAME)
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for ResetServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            bearer_token: None,
        }
    }
}

impl Default for PinGuardConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            lockout: LockoutPolicy::default(),
            hash_algorithm: HashAlgorithm::default(),
            reset_service: ResetServiceConfig::default(),
        }
    }
}

impl PinGuardConfig {
    /// Default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| PinError::Storage(format!("Failed to parse config file: {}", e)))
    }

    /// Load configuration, falling back to defaults if the file is missing or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        Self::load(path).unwrap_or_else(|e| {
            warn!("Failed to load config file {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = PinGuardConfig::default();
        assert_eq!(config.lockout.max_attempts, 5);
        assert_eq!(config.lockout.lockout_duration_secs, 1800);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert!(config.storage_path.ends_with("pinguard/credentials.json"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "hash_algorithm": "argon2id", "lockout": { "max_attempts": 3, "lockout_duration_secs": 60 } }"#;
        let config: PinGuardConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.hash_algorithm, HashAlgorithm::Argon2id);
        assert_eq!(config.lockout.max_attempts, 3);
        assert_eq!(config.reset_service, ResetServiceConfig::default());
    }

    #[test]
    fn test_zero_max_attempts_is_clamped_on_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "lockout": { "max_attempts": 0, "lockout_duration_secs": 60 } }"#,
        )
        .unwrap();

        let config = PinGuardConfig::load(&path).unwrap();
        assert_eq!(config.lockout.max_attempts, 1);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let mut config = PinGuardConfig::default();
        config.reset_service.base_url = "https://api.example.com".to_string();
        config.save(&path).unwrap();

        assert_eq!(PinGuardConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(PinGuardConfig::load_or_default(&path), PinGuardConfig::default());
    }
}
