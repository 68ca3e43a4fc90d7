//! Authenticated session: owns the credential pair and wraps every call
//! that needs it.
//!
//! Refresh protocol for `authenticated_request`:
//! 1. send with `Authorization: <access token>`
//! 2. on 401 `expired JWT access token`, refresh once
//! 3. on refresh success, retry the request once with the new token
//! 4. on refresh failure, fail with `AuthError::SessionExpired`
//!
//! Concurrent callers share a single refresh, whether they hit the expiry
//! or call `refresh` directly. Every change of the credential pair bumps a
//! generation counter; a caller that waited on the refresh gate and finds a
//! newer generation simply retries, and a generation whose refresh was
//! rejected is never refreshed again. A refreshed pair is only stored if the
//! generation it was issued for is still current, so `log_out` always wins
//! over a refresh in flight.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::credentials::{CredentialPair, CredentialStore};
use super::error::AuthError;
use super::navigation::{AuthMessage, LogoutOptions, Navigator};
use super::storage::{KeyValueStorage, StorageError};
use crate::api::{ApiClient, ApiResponse, RequestOptions};
use crate::result::Outcome;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh_token";

/// Upper bound for a single refresh round-trip.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;

const AUTHORIZATION_HEADER: &str = "Authorization";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

/// Failure branch handed to call sites after a forced logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpiredFailure;

#[derive(Debug, Default)]
struct TokenState {
    credentials: CredentialPair,
    generation: u64,
    rejected_generation: Option<u64>,
    /// Last refresh response, keyed by the generation it was sent for
    last_refresh: Option<(u64, ApiResponse)>,
}

pub struct Auth<S> {
    api: ApiClient,
    store: CredentialStore<S>,
    state: Mutex<TokenState>,
    refresh_gate: tokio::sync::Mutex<()>,
    refresh_timeout: Duration,
}

impl<S: KeyValueStorage> Auth<S> {
    /// Create a session, rehydrating whatever credentials `storage` holds.
    pub fn new(api: ApiClient, storage: S) -> Self {
        let store = CredentialStore::new(storage);
        let credentials = store.read();

        debug!(logged_in = credentials.is_logged_in(), "Loaded stored credentials");

        Self {
            api,
            store,
            state: Mutex::new(TokenState {
                credentials,
                ..TokenState::default()
            }),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock_state().credentials.is_logged_in()
    }

    pub fn credentials(&self) -> CredentialPair {
        self.lock_state().credentials.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock_state().credentials.access_token.clone()
    }

    /// Exchange email and password for a token pair.
    ///
    /// A non-2xx response is returned as-is and leaves the session untouched.
    pub async fn log_in(&self, email: &str, password: &str) -> Result<ApiResponse, AuthError> {
        let options = RequestOptions::new().json(json!({ "email": email, "password": password }));
        let response = self.api.request(Method::POST, LOGIN_PATH, options).await?;

        self.handle_token_result(&response)?;

        if response.is_success() {
            info!("Logged in");
        } else {
            debug!(status = response.status().as_u16(), "Login rejected");
        }

        Ok(response)
    }

    /// Trade the current refresh token for a new pair. Bounded by the
    /// refresh timeout.
    ///
    /// Callers racing each other (or an expiry-triggered refresh) share one
    /// round-trip and all get its response.
    pub async fn refresh(&self) -> Result<ApiResponse, AuthError> {
        let seen_generation = self.lock_state().generation;
        let _gate = self.refresh_gate.lock().await;

        if let Some(response) = self.joined_refresh(seen_generation)? {
            debug!("Joined a concurrent token refresh");
            return Ok(response);
        }
        self.refresh_locked().await
    }

    /// Send a request as the logged-in user, refreshing the access token at
    /// most once if the backend reports it expired.
    pub async fn authenticated_request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, AuthError> {
        let (response, generation) = self
            .send_authenticated(method.clone(), path, options.clone())
            .await?;

        if !response.is_expired_access_token() {
            return Ok(response);
        }

        debug!(path = path, "Access token expired, refreshing");
        self.refresh_after_expiry(generation).await?;

        debug!(path = path, "Retrying with refreshed access token");
        let (retried, _) = self.send_authenticated(method, path, options).await?;
        Ok(retried)
    }

    /// Like `authenticated_request`, but an expired session logs the user
    /// out (with the expiry message) and comes back as a `Failure`.
    pub async fn authenticated_request_with_logout_when_session_expired(
        &self,
        navigator: &dyn Navigator,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Outcome<ApiResponse, SessionExpiredFailure>, AuthError> {
        match self.authenticated_request(method, path, options).await {
            Ok(response) => Ok(Outcome::Success(response)),
            Err(AuthError::SessionExpired) => {
                warn!(path = path, "Session expired, logging out");
                self.log_out(
                    Some(navigator),
                    LogoutOptions::with_message(AuthMessage::session_expired()),
                )?;
                Ok(Outcome::Failure(SessionExpiredFailure))
            }
            Err(e) => Err(e),
        }
    }

    /// Forget both tokens, in memory and in storage, then navigate if asked.
    ///
    /// Memory is cleared and navigation happens even when storage fails;
    /// the storage error is still reported.
    pub fn log_out(
        &self,
        navigator: Option<&dyn Navigator>,
        options: LogoutOptions,
    ) -> Result<(), AuthError> {
        // Storage is cleared under the state lock so a concurrent token
        // write cannot land between the two
        let cleared = {
            let mut state = self.lock_state();
            state.credentials = CredentialPair::empty();
            state.generation += 1;
            state.rejected_generation = None;
            state.last_refresh = None;
            self.store.clear()
        };

        if let Some(navigator) = navigator {
            navigator.navigate(&options.redirect_to, options.message.as_ref());
        }

        info!("Logged out");
        cleared.map_err(AuthError::from)
    }

    async fn send_authenticated(
        &self,
        method: Method,
        path: &str,
        mut options: RequestOptions,
    ) -> Result<(ApiResponse, u64), AuthError> {
        let (token, generation) = {
            let state = self.lock_state();
            let token = state
                .credentials
                .access_token
                .clone()
                .ok_or(AuthError::NotLoggedIn)?;
            (token, state.generation)
        };

        options.set_header(AUTHORIZATION_HEADER, token);

        let response = self.api.request(method, path, options).await?;
        Ok((response, generation))
    }

    /// Make sure the pair that failed with `seen_generation` has been
    /// replaced, refreshing it ourselves if nobody else has.
    async fn refresh_after_expiry(&self, seen_generation: u64) -> Result<(), AuthError> {
        let _gate = self.refresh_gate.lock().await;

        {
            let state = self.lock_state();
            if state.generation != seen_generation {
                return if state.credentials.is_logged_in() {
                    debug!("Tokens already replaced by a concurrent refresh");
                    Ok(())
                } else {
                    Err(AuthError::SessionExpired)
                };
            }
            if state.rejected_generation == Some(seen_generation) {
                return Err(AuthError::SessionExpired);
            }
        }

        let response = self.refresh_locked().await?;
        if response.is_success() {
            info!("Access token refreshed");
            Ok(())
        } else {
            warn!(
                status = response.status().as_u16(),
                invalid_refresh_token = response.is_invalid_refresh_token(),
                "Token refresh rejected"
            );
            Err(AuthError::SessionExpired)
        }
    }

    /// The response of a refresh someone else already ran for
    /// `seen_generation`, if any.
    fn joined_refresh(&self, seen_generation: u64) -> Result<Option<ApiResponse>, AuthError> {
        let state = self.lock_state();
        if !state.credentials.is_logged_in() {
            return Err(AuthError::NotLoggedIn);
        }
        Ok(state
            .last_refresh
            .as_ref()
            .filter(|(generation, _)| *generation == seen_generation)
            .map(|(_, response)| response.clone()))
    }

    /// Send the refresh request. Callers must hold `refresh_gate`.
    async fn refresh_locked(&self) -> Result<ApiResponse, AuthError> {
        let (credentials, generation) = {
            let state = self.lock_state();
            (state.credentials.clone(), state.generation)
        };
        let access_token = credentials.access_token.ok_or(AuthError::NotLoggedIn)?;
        let options = RequestOptions::new()
            .json(json!({ "refresh_token": credentials.refresh_token }))
            .header(AUTHORIZATION_HEADER, access_token);

        let request = self.api.request(Method::POST, REFRESH_PATH, options);
        let response = tokio::time::timeout(self.refresh_timeout, request)
            .await
            .map_err(|_| AuthError::RefreshTimedOut(self.refresh_timeout))??;

        if !response.is_success() {
            let mut state = self.lock_state();
            if state.generation == generation {
                state.rejected_generation = Some(generation);
                state.last_refresh = Some((generation, response.clone()));
            }
            return Ok(response);
        }

        let tokens: TokenResponse = response.json()?;
        let refreshed = CredentialPair::new(tokens.access_token, tokens.refresh_token);
        if self.replace_credentials(refreshed, Some(generation))? {
            self.lock_state().last_refresh = Some((generation, response.clone()));
            return Ok(response);
        }

        // The pair changed while the refresh was in flight
        if self.is_logged_in() {
            debug!("Discarded refreshed tokens, session was replaced by a login");
            Ok(response)
        } else {
            info!("Discarded refreshed tokens, session was logged out");
            Err(AuthError::NotLoggedIn)
        }
    }

    fn handle_token_result(&self, response: &ApiResponse) -> Result<(), AuthError> {
        if !response.is_success() {
            return Ok(());
        }

        let tokens: TokenResponse = response.json()?;
        self.replace_credentials(CredentialPair::new(tokens.access_token, tokens.refresh_token), None)?;
        Ok(())
    }

    /// Store `credentials` unless the pair has moved past
    /// `expected_generation`. Returns whether they were stored.
    fn replace_credentials(
        &self,
        credentials: CredentialPair,
        expected_generation: Option<u64>,
    ) -> Result<bool, StorageError> {
        let mut state = self.lock_state();
        if expected_generation.is_some_and(|expected| expected != state.generation) {
            return Ok(false);
        }

        self.store.write(&credentials)?;
        state.credentials = credentials;
        state.generation += 1;
        state.rejected_generation = None;
        Ok(true)
    }

    fn lock_state(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
