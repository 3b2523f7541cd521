//! Error types for key parsing and preimage search

use thiserror::Error;

/// Errors produced when turning text into an [`AssetKey`](crate::AssetKey)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    /// Input had the wrong number of hex digits
    #[error("Invalid key length: expected {expected} hex digits, got {actual}")]
    InvalidLength {
        /// Accepted digit count (or upper bound)
        expected: usize,
        /// Digits actually supplied
        actual: usize,
    },

    /// Input contained a non-hex character
    #[error("Not a hash: {0:?}")]
    NotHex(String),
}

/// Errors that can end a preimage search without a result
#[derive(Debug, Error)]
pub enum SearchError {
    /// Search was cancelled before any worker found a match
    #[error("No preimage found for {target}")]
    NoPreimageFound {
        /// Key that was being searched for
        target: crate::AssetKey,
    },

    /// Search parameters are unusable
    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),

    /// The operating system random source failed
    #[error("Random source failure: {0}")]
    Entropy(getrandom::Error),

    /// A worker thread could not be started
    #[error("Failed to spawn search worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<getrandom::Error> for SearchError {
    fn from(err: getrandom::Error) -> Self {
        Self::Entropy(err)
    }
}
