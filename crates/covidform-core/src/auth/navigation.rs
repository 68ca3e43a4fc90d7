//! Where the user goes after a logout, and what they are told.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Login route used when a logout does not name another target
pub const DEFAULT_LOGIN_ROUTE: &str = "/admin/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Danger,
}

/// User-facing message carried along with a navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMessage {
    pub message: String,
    pub severity: Severity,
}

impl AuthMessage {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    /// Shown after the session was ended because the refresh token was rejected
    pub fn session_expired() -> Self {
        Self::new(
            "Platnost Vašeho přihlášení vypršela, přihlaste se prosím znovu.",
            Severity::Warning,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOptions {
    pub redirect_to: String,
    pub message: Option<AuthMessage>,
}

impl Default for LogoutOptions {
    fn default() -> Self {
        Self {
            redirect_to: DEFAULT_LOGIN_ROUTE.to_string(),
            message: None,
        }
    }
}

impl LogoutOptions {
    pub fn with_message(message: AuthMessage) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }
}

/// Front-end hook that moves the user to another screen.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str, message: Option<&AuthMessage>);
}

/// Remembers every navigation; useful for headless front ends and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<(String, Option<AuthMessage>)>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<(String, Option<AuthMessage>)> {
        self.visits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<(String, Option<AuthMessage>)> {
        self.visits().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str, message: Option<&AuthMessage>) {
        self.visits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((target.to_string(), message.cloned()));
    }
}
