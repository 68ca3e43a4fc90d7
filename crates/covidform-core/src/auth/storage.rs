//! Key-value persistence backends and the typed JSON blob on top of them.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring operation failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("stored data could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// String blobs addressed by key. Implementations replace a value in a
/// single step: readers see either the old blob or the new one.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// One file per key inside a directory. On unix the directory is created
/// `0700` and blobs are written `0600`, since they hold bearer tokens.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", key))
    }

    fn create_dir(&self) -> std::io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir)
    }
}

/// Open `path` for writing, truncating it, readable by the owner only.
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.create_dir()?;
        // Write-then-rename so a crash never leaves half a blob behind
        let temp = self.temp_path_for(key);
        // A stale temp file may carry looser permissions than `open_private` sets
        if let Err(e) = fs::remove_file(&temp) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        let mut file = open_private(&temp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, self.path_for(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// A single JSON document stored under one key.
#[derive(Debug, Clone)]
pub struct JsonStorage<S> {
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> JsonStorage<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        match self.storage.get(&self.key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn write<T: Serialize>(&self, data: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(data)?;
        self.storage.set(&self.key, &raw)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.key)
    }

    pub fn is_filled(&self) -> Result<bool, StorageError> {
        Ok(self
            .storage
            .get(&self.key)?
            .map(|raw| !raw.is_empty())
            .unwrap_or(false))
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(!self.is_filled()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("data").unwrap(), None);

        storage.set("data", "{}").unwrap();
        assert_eq!(storage.get("data").unwrap().as_deref(), Some("{}"));

        storage.remove("data").unwrap();
        assert_eq!(storage.get("data").unwrap(), None);
    }

    #[test]
    fn test_file_storage_replaces_whole_blob() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        storage.set("auth", r#"{"a":1}"#).unwrap();
        storage.set("auth", r#"{"b":2}"#).unwrap();

        assert_eq!(storage.get("auth").unwrap().as_deref(), Some(r#"{"b":2}"#));
        assert!(!dir.path().join("nested").join(".auth.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("covidform");
        let storage = FileStorage::new(&root);

        // Leftover temp file from an older, world-readable write
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(".data.json.tmp"), "stale").unwrap();
        fs::set_permissions(root.join(".data.json.tmp"), fs::Permissions::from_mode(0o644)).unwrap();

        storage.set("data", r#"{"accessToken":"A1"}"#).unwrap();

        let mode = fs::metadata(root.join("data.json")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_creates_private_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("covidform");
        FileStorage::new(&root).set("data", "{}").unwrap();

        let mode = fs::metadata(&root).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_file_storage_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.remove("never-written").unwrap();
        assert_eq!(storage.get("never-written").unwrap(), None);
    }

    #[test]
    fn test_json_storage_read_write_clear() {
        let store = JsonStorage::new(MemoryStorage::new(), "data");
        assert!(store.is_empty().unwrap());
        assert_eq!(store.read::<Value>().unwrap(), None);

        store.write(&json!({"accessToken": "A1"})).unwrap();
        assert!(store.is_filled().unwrap());
        assert_eq!(store.read::<Value>().unwrap(), Some(json!({"accessToken": "A1"})));

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_json_storage_malformed_is_error() {
        let storage = MemoryStorage::new();
        storage.set("data", "{not json").unwrap();
        let store = JsonStorage::new(storage, "data");
        assert!(matches!(store.read::<Value>(), Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_arc_storage_shares_state() {
        let shared = Arc::new(MemoryStorage::new());
        let store = JsonStorage::new(Arc::clone(&shared), "data");
        store.write(&json!([1, 2])).unwrap();
        assert_eq!(shared.get("data").unwrap().as_deref(), Some("[1,2]"));
    }
}
