//! Command-line front end for hash-addressed asset archives
//!
//! The `hashpack` binary is a thin wrapper around this library:
//!
//! 1. [`Cli`] parses arguments and environment variables
//! 2. [`Cli::validate`] rejects bad values and refuses to overwrite existing
//!    outputs unless `--force` is given
//! 3. [`run`] executes the command and returns an [`Outcome`]
//! 4. [`Outcome::render`] prints it as text or JSON
//!
//! # Commands
//!
//! - `hash`: print the key of each path
//! - `build`: pack a directory into a table/blob pair
//! - `extract`: unpack an archive, naming files through the name datasets
//! - `lookup`: resolve a key in both byte orders, optionally brute-forcing it
//!   on a miss (`--brute-force`)
//! - `search`: run a preimage search, optionally bounded by `--timeout-secs`

#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{Outcome, run};
pub use config::{Cli, Command};
pub use error::{CommandError, ConfigError};
