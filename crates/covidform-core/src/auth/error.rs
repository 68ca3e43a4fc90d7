use thiserror::Error;

use super::storage::StorageError;
use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// An authenticated endpoint was called without an access token
    #[error("not logged in")]
    NotLoggedIn,

    /// The access token expired and the refresh token was rejected too
    #[error("session expired - please log in again")]
    SessionExpired,

    #[error("token refresh did not finish within {0:?}")]
    RefreshTimedOut(std::time::Duration),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to persist credentials: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Whether the caller has to send the user back to the login screen
    pub fn requires_login(&self) -> bool {
        matches!(self, AuthError::NotLoggedIn | AuthError::SessionExpired)
    }
}
