//! Error types for archive operations

use hashpack_crypto::AssetKey;
use std::path::PathBuf;
use thiserror::Error;

/// Archive operation result type
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that abort an archive build, load or extraction
///
/// Problems confined to a single input file during a build are not errors;
/// they are recorded in the [`BuildReport`](super::BuildReport).
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The source directory could not be read at all
    #[error("Source directory unreadable: {path}: {source}")]
    SourceUnreadable {
        /// Directory that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The source path exists but is not a directory
    #[error("Source is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Alignment is zero or not a power of two
    #[error("Invalid alignment {0}: must be a non-zero power of two")]
    InvalidAlignment(u32),

    /// Table, blob or dataset does not match the expected layout
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Two inputs map to the same key
    #[error("Key collision on {key}: {path} conflicts with {existing}")]
    KeyCollision {
        /// Shared key
        key: AssetKey,
        /// Input that lost
        path: String,
        /// Input that was archived first
        existing: String,
    },

    /// Unknown-namespace file name is not a literal key
    #[error("Not a hash: {0}")]
    MalformedHashLiteral(String),

    /// Blob would grow past the 32-bit offset range
    #[error("Blob overflow: {size} bytes at offset {offset} exceed the 32-bit range")]
    BlobOverflow {
        /// Write cursor before the payload
        offset: u64,
        /// Payload length
        size: u64,
    },

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Check if this error describes a damaged or foreign file
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::FormatMismatch(_) | Self::BinRw(_))
    }
}
