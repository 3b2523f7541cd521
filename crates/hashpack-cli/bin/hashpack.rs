//! hashpack binary entry point.
//!
//! This is a thin wrapper around the hashpack-cli library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Runs the command and prints its outcome
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.

use anyhow::{Context, Result};
use hashpack_cli::{Cli, run};
use std::io::Write;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::from_args();
    tracing::debug!(command = ?cli.command, "Arguments parsed");

    let outcome = run(&cli).context("hashpack command failed")?;

    let mut stdout = std::io::stdout().lock();
    outcome
        .render(cli.json, &mut stdout)
        .context("Failed to print result")?;
    stdout.flush()?;

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
