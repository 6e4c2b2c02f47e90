//! Core configuration.

use crate::error::{CoreError, CoreResult};
use droplit_crypto::KdfParams;
use droplit_drops::BatchPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for an [`EncryptionService`](crate::EncryptionService).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// User identity the key store is bound to.
    pub identity: String,

    /// Directory for the key record database and device key file. `None`
    /// keeps everything in memory for the process lifetime.
    pub data_dir: Option<PathBuf>,

    /// Argon2id parameters for new password-derived keys. Existing keys
    /// always use the parameters stored in their record.
    pub kdf: KdfParams,

    /// Handling of undecryptable drops in inbound batches.
    pub batch_policy: BatchPolicy,

    /// Blocking worker tasks used by batch decryption. `0` means one per
    /// available CPU.
    pub decrypt_workers: usize,

    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            identity: "default".to_string(),
            data_dir: None,
            kdf: KdfParams::default(),
            batch_policy: BatchPolicy::SkipAndReport,
            decrypt_workers: 0,
            log_filter: None,
        }
    }
}

impl CoreConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))
    }

    pub fn key_db_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("keys.duckdb"))
    }

    pub fn device_key_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("device.key"))
    }

    pub(crate) fn worker_count(&self) -> usize {
        if self.decrypt_workers > 0 {
            return self.decrypt_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_memory() {
        let config = CoreConfig::default();
        assert!(config.data_dir.is_none());
        assert!(config.key_db_path().is_none());
        assert_eq!(config.kdf, KdfParams::default());
        assert_eq!(config.batch_policy, BatchPolicy::SkipAndReport);
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn paths_live_under_data_dir() {
        let config = CoreConfig {
            data_dir: Some(PathBuf::from("/var/droplit")),
            ..CoreConfig::default()
        };
        assert_eq!(config.key_db_path(), Some(PathBuf::from("/var/droplit/keys.duckdb")));
        assert_eq!(config.device_key_path(), Some(PathBuf::from("/var/droplit/device.key")));
    }

    #[test]
    fn json_overrides() {
        let config: CoreConfig = serde_json::from_str(
            r#"{
                "identity": "alice@example.com",
                "batch_policy": "fail_fast",
                "decrypt_workers": 2,
                "kdf": {
                    "algorithm": "argon2id",
                    "memory_kib": 1024,
                    "iterations": 1,
                    "parallelism": 1
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.identity, "alice@example.com");
        assert_eq!(config.batch_policy, BatchPolicy::FailFast);
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.kdf, KdfParams::light());
    }
}
