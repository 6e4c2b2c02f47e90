//! Per-device wrapping secret for device-generated master keys.

use crate::error::{VaultError, VaultResult};
use droplit_crypto::{KEY_SIZE, KeyMaterial};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Supplies the key that wraps device-generated master keys at rest.
pub trait DeviceKeyProvider: Send + Sync {
    fn wrapping_key(&self) -> VaultResult<KeyMaterial>;
}

/// Wrapping key held in memory. Used by tests and in-memory sessions.
pub struct StaticDeviceKey(KeyMaterial);

impl StaticDeviceKey {
    pub fn new(material: KeyMaterial) -> Self {
        Self(material)
    }

    pub fn random() -> Self {
        Self(KeyMaterial::random())
    }
}

impl DeviceKeyProvider for StaticDeviceKey {
    fn wrapping_key(&self) -> VaultResult<KeyMaterial> {
        Ok(self.0.clone())
    }
}

/// Wrapping key stored in a file next to the app data.
///
/// The file is created atomically with 32 random bytes on first use
/// (owner-only on Unix) and reused on every later session. Deleting it makes any stored
/// device-generated key unrecoverable.
pub struct FileDeviceKey {
    path: PathBuf,
    cached: Mutex<Option<KeyMaterial>>,
}

impl FileDeviceKey {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_or_create(&self) -> VaultResult<KeyMaterial> {
        match fs::read(&self.path) {
            // Left behind by a creation that never finished; nothing was
            // ever wrapped with it.
            Ok(bytes) if bytes.is_empty() => {
                warn!("device key {} is empty, replacing it", self.path.display());
                self.create(true)
            }
            Ok(bytes) => read_material(&self.path, &bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => self.create(false),
            Err(e) => Err(storage(e)),
        }
    }

    /// Writes a fresh key to a temp file in the same directory and moves it
    /// into place, so the key file is never observed partially written.
    fn create(&self, replace: bool) -> VaultResult<KeyMaterial> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(storage)?;

        let material = KeyMaterial::random();
        let mut tmp = NamedTempFile::new_in(dir).map_err(storage)?;
        tmp.write_all(material.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(storage)?;

        let persisted = if replace {
            tmp.persist(&self.path)
        } else {
            tmp.persist_noclobber(&self.path)
        };
        match persisted {
            Ok(_) => info!("created device key at {}", self.path.display()),
            // Another process won the race; use its key.
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(storage(e.error)),
        }

        // Whatever landed on disk is the key every process will use.
        let bytes = fs::read(&self.path).map_err(storage)?;
        read_material(&self.path, &bytes)
    }
}

impl DeviceKeyProvider for FileDeviceKey {
    fn wrapping_key(&self) -> VaultResult<KeyMaterial> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        if let Some(material) = cached.as_ref() {
            return Ok(material.clone());
        }
        let material = self.load_or_create()?;
        *cached = Some(material.clone());
        Ok(material)
    }
}

fn read_material(path: &Path, bytes: &[u8]) -> VaultResult<KeyMaterial> {
    if bytes.len() != KEY_SIZE {
        return Err(VaultError::Storage(format!(
            "device key {} has {} bytes, expected {KEY_SIZE}",
            path.display(),
            bytes.len()
        )));
    }
    Ok(KeyMaterial::from_slice(bytes)?)
}

fn storage(err: std::io::Error) -> VaultError {
    VaultError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_is_created_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("device.key");

        let first = FileDeviceKey::new(&path).wrapping_key().unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), KEY_SIZE);

        let second = FileDeviceKey::new(&path).wrapping_key().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn truncated_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.key");
        fs::write(&path, [1u8; 10]).unwrap();

        let err = FileDeviceKey::new(&path).wrapping_key().unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));
    }

    #[test]
    fn empty_file_from_interrupted_creation_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.key");
        fs::write(&path, []).unwrap();

        let material = FileDeviceKey::new(&path).wrapping_key().unwrap();
        assert_eq!(fs::read(&path).unwrap(), material.as_bytes());

        let again = FileDeviceKey::new(&path).wrapping_key().unwrap();
        assert_eq!(again.as_bytes(), material.as_bytes());
    }

    #[test]
    fn racing_creators_agree_on_one_key() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.key");
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    FileDeviceKey::new(path).wrapping_key().unwrap().as_bytes().to_vec()
                })
            })
            .collect();

        let keys: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let on_disk = fs::read(&path).unwrap();
        assert!(keys.iter().all(|k| *k == on_disk));
        // Only the key file is left; no temp files.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.key");
        FileDeviceKey::new(&path).wrapping_key().unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
