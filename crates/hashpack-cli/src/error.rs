//! Error types for the command-line tool.

use hashpack_crypto::{KeyParseError, SearchError};
use hashpack_formats::{ArchiveError, NameIndexError};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingRequired(String),

    /// Output exists and `--force` was not given
    #[error("Refusing to overwrite {}: pass --force to replace it", .0.display())]
    OutputExists(PathBuf),

    /// Argument value out of range
    #[error("Invalid {name}: {reason}")]
    InvalidValue {
        /// Argument name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration rejected before any work started
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Archive build, read or extraction failed
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Name datasets could not be loaded or the query was malformed
    #[error(transparent)]
    Names(#[from] NameIndexError),

    /// Key argument is not hexadecimal
    #[error("Invalid key: {0}")]
    Key(#[from] KeyParseError),

    /// Preimage search ended without a result
    #[error(transparent)]
    Search(#[from] SearchError),

    /// JSON output failed
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing output failed
    #[error("Output failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_exists_message() {
        let err = ConfigError::OutputExists(PathBuf::from("out.tbl"));
        assert_eq!(
            err.to_string(),
            "Refusing to overwrite out.tbl: pass --force to replace it"
        );
    }

    #[test]
    fn test_config_errors_pass_through() {
        let err = CommandError::from(ConfigError::MissingRequired("source".to_string()));
        assert_eq!(err.to_string(), "Missing required input: source");
    }
}
