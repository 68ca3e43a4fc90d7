use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::storage::{JsonStorage, KeyValueStorage, StorageError};

/// Storage key the credential blob lives under
pub const CREDENTIALS_KEY: &str = "data";

/// Access and refresh token, always persisted together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    /// The logged-out pair
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Durable home of the credential pair.
#[derive(Debug, Clone)]
pub struct CredentialStore<S> {
    blob: JsonStorage<S>,
}

impl<S: KeyValueStorage> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, CREDENTIALS_KEY)
    }

    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        Self {
            blob: JsonStorage::new(storage, key),
        }
    }

    pub fn storage(&self) -> &S {
        self.blob.storage()
    }

    /// Load the stored pair. Absent, unreadable or malformed data all yield
    /// the empty pair.
    pub fn read(&self) -> CredentialPair {
        match self.blob.read::<CredentialPair>() {
            Ok(Some(pair)) => pair,
            Ok(None) => CredentialPair::empty(),
            Err(e) => {
                warn!(error = %e, key = self.blob.key(), "Ignoring unreadable stored credentials");
                CredentialPair::empty()
            }
        }
    }

    pub fn write(&self, pair: &CredentialPair) -> Result<(), StorageError> {
        self.blob.write(pair)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.blob.clear()
    }
}

/// Blobs kept in the OS keychain, one keychain entry per key.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl KeyValueStorage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
