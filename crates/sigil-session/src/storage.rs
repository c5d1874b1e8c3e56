//! Key-value storage backends for session data.
//!
//! The [`KeyValueStore`] trait decouples the token store from where bytes
//! live. [`FileStore`] is the durable tier (survives restarts),
//! [`MemoryStore`] the ephemeral one (gone when the session ends), and
//! [`UnavailableStore`] models persistence that is switched off.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::StorageError;

/// Default file name for durable credentials within the data directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

type StorageResult<T> = std::result::Result<T, StorageError>;

/// A string key-value store.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Read a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

// ============================================================================
// FileStore
// ============================================================================

/// Durable store backed by a JSON object on disk.
///
/// Every operation re-reads the file, so a new `FileStore` on the same path
/// sees exactly what a previous process wrote.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store at `<data_dir>/credentials.json`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(CREDENTIALS_FILE))
    }

    /// Create a store at a custom file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if map.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).map_err(|e| self.io_error(e))?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        restrict_permissions(&tmp).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock();
        // An unparseable file holds no recoverable session; start over.
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StorageError::Serialization(e)) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Replacing unreadable credentials file"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut map);
        self.write_map(&map)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        trace!(key = %key, path = %self.path.display(), "FileStore set");
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Ephemeral in-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every value, as happens when the session ends.
    pub fn clear_all(&self) {
        self.values.lock().clear();
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// UnavailableStore
// ============================================================================

/// A store whose every operation fails, modelling disabled persistence.
#[derive(Debug, Default, Clone)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable("persistence disabled".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("persistence disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("persistence disabled".to_string()))
    }
}
