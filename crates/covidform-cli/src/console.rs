//! Terminal plumbing shared by the commands: the session wiring, the
//! navigator that turns redirects into printed notices, and prompts.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use covidform_core::auth::{AuthMessage, KeyValueStorage, Navigator, Severity};
use covidform_core::services::{CrudOutcome, RequestFailure};
use covidform_core::{Auth, AuthError, Config, Outcome};
use tracing::debug;

/// Everything a command needs to talk to the backend.
pub(crate) struct Console {
    pub config: Config,
    pub auth: Auth<Arc<dyn KeyValueStorage>>,
    pub navigator: TerminalNavigator,
}

impl Console {
    pub fn open() -> Result<Self> {
        let config = Config::load()?.with_env();
        let auth = Auth::new(config.api_client()?, config.credential_storage()?)
            .with_refresh_timeout(config.refresh_timeout());

        debug!(
            base_url = %config.base_url,
            app_type = ?config.app_type,
            credential_backend = ?config.credential_backend,
            "Session opened"
        );

        Ok(Self {
            config,
            auth,
            navigator: TerminalNavigator,
        })
    }

    /// Turn a service result into the record, or an error worth printing.
    pub fn settle<T>(&self, result: Result<CrudOutcome<T>, AuthError>) -> Result<T> {
        match result {
            Ok(Outcome::Success(value)) => Ok(value),
            Ok(Outcome::Failure(RequestFailure::SessionExpired)) => {
                bail!("session expired; run `covidform login`")
            }
            Ok(Outcome::Failure(failure)) => bail!("backend refused the request: {}", failure),
            Err(e) if e.requires_login() => {
                Err(e).context("run `covidform login` first")
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Prints navigation notices instead of switching screens.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, target: &str, message: Option<&AuthMessage>) {
        debug!(target = target, "Navigation requested");
        if let Some(message) = message {
            let label = match message.severity {
                Severity::Info => "info",
                Severity::Warning => "warning",
                Severity::Danger => "error",
            };
            eprintln!("{}: {}", label, message.message);
        }
    }
}

pub(crate) fn prompt_line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("{} [{}]: ", label, default),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (true, Some(default)) => Ok(default.to_string()),
        _ => Ok(input.to_string()),
    }
}

pub(crate) fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
