//! Authentication module for the admin area.
//!
//! This module provides:
//! - `Auth`: the session manager that owns the token pair and performs
//!   authenticated requests with a single refresh-and-retry on expiry
//! - `CredentialStore`: durable storage of the token pair as one JSON blob
//! - Storage backends: files on disk, the OS keychain, or memory
//! - `Navigator`: the hook a front end implements to be sent to the login
//!   screen after a forced logout

pub mod credentials;
pub mod error;
pub mod navigation;
pub mod session;
pub mod storage;

pub use credentials::{CredentialPair, CredentialStore, KeyringStorage, CREDENTIALS_KEY};
pub use error::AuthError;
pub use navigation::{AuthMessage, LogoutOptions, Navigator, RecordingNavigator, Severity};
pub use session::{Auth, SessionExpiredFailure, LOGIN_PATH, REFRESH_PATH};
pub use storage::{FileStorage, JsonStorage, KeyValueStorage, MemoryStorage, StorageError};
