//! Error types for name dataset loading and lookup

use hashpack_crypto::KeyParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Name index operation result type
pub type NameIndexResult<T> = Result<T, NameIndexError>;

/// Errors raised while loading name datasets or parsing queries
///
/// A key that no dataset knows is not an error: it resolves to an empty
/// [`ResolveResult`](super::ResolveResult).
#[derive(Debug, Error)]
pub enum NameIndexError {
    /// Dataset file could not be read or written
    #[error("Dataset I/O failed for {path}: {source}")]
    Io {
        /// Dataset path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Dataset does not match its fixed layout
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Query is not a hexadecimal key
    #[error("Malformed hash literal: {0}")]
    MalformedHashLiteral(#[from] KeyParseError),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl NameIndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error describes a damaged or foreign dataset
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::FormatMismatch(_) | Self::BinRw(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NameIndexError::FormatMismatch("key set is 5 bytes".to_string());
        assert_eq!(err.to_string(), "Format mismatch: key set is 5 bytes");
        assert!(err.is_format_error());

        let err = NameIndexError::from(KeyParseError::NotHex("xyz".to_string()));
        assert!(err.to_string().starts_with("Malformed hash literal"));
        assert!(!err.is_format_error());
    }
}
