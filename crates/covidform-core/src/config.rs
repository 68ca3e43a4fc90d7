//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: which
//! backend to talk to, which flavour of the registration system it runs,
//! timeouts, and the last email used to log in.
//!
//! Configuration is stored at `~/.config/covidform/config.json`; the
//! `COVIDFORM_BACKEND_URL` and `COVIDFORM_APP_TYPE` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::api::ApiClient;
use crate::auth::session::DEFAULT_REFRESH_TIMEOUT_SECS;
use crate::auth::{FileStorage, KeyValueStorage, KeyringStorage};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "covidform";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND_URL: &str = "COVIDFORM_BACKEND_URL";
pub const ENV_APP_TYPE: &str = "COVIDFORM_APP_TYPE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    #[default]
    CovidTest,
    Vaccination,
}

impl AppType {
    /// Anything other than `vaccination` means a testing deployment
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("vaccination") {
            AppType::Vaccination
        } else {
            AppType::CovidTest
        }
    }
}

/// Where the credential blob is kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub app_type: AppType,
    pub request_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_type: AppType::default(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|url| !url.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(app_type) = lookup(ENV_APP_TYPE) {
            self.app_type = AppType::from_env_value(&app_type);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::with_timeout(&self.base_url, self.request_timeout())
            .with_context(|| format!("Failed to create API client for {}", self.base_url))
    }

    /// Open the configured credential backend
    pub fn credential_storage(&self) -> Result<Arc<dyn KeyValueStorage>> {
        let storage: Arc<dyn KeyValueStorage> = match self.credential_backend {
            CredentialBackend::File => Arc::new(FileStorage::new(self.data_dir()?)),
            CredentialBackend::Keyring => Arc::new(KeyringStorage::new(APP_NAME)),
        };
        Ok(storage)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted credential blob
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
