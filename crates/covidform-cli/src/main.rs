//! covidform - command-line console for the registration backend's admin area.
//!
//! Logs in against the backend, keeps the token pair on disk between runs
//! and manages exam types, time slots, settings and daily limit overrides.

mod cli;
mod console;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::CliOpts;

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: u8) {
    // RUST_LOG wins over -v when set
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let opts = CliOpts::parse();
    init_tracing(opts.verbose());
    debug!(?opts, "Parsed arguments");

    opts.run().await
}
