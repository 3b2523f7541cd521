//! Binary formats and builders for hash-addressed asset archives
//!
#![allow(clippy::cast_possible_truncation)] // Counts are bounded by u32 file layouts
#![allow(clippy::doc_markdown)] // Format names don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate provides symmetric (parser and builder) implementations for the
//! files that make up a hash-addressed archive and its name datasets.
//!
//! # Supported Formats
//!
//! - **Archive table**: alignment plus a fixed-width `{key, offset, size}` list
//! - **Archive blob**: concatenated payloads, each padded with `'0'` bytes to
//!   the table's alignment
//! - **Key set**: flat list of precomputed little-endian keys
//! - **Cross-reference**: key → usage-key records plus a list of plaintext
//!   names that are re-hashed on load
//!
//! # Components
//!
//! - [`archive::ArchiveBuilder`] walks a directory and writes a table/blob pair
//! - [`archive::ArchiveReader`] validates a pair and reads payloads back by key
//! - [`archive::extract`] unpacks an archive, naming files through a
//!   [`names::NameIndex`] where possible
//! - [`names::NameIndex`] resolves keys back to names, set memberships and
//!   usages
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: every format can be parsed and built
//! - **Round-Trip Guarantee**: `parse(build(data)) == data`
//! - **Batch Tolerance**: per-file problems are counted in a report, only
//!   structural problems abort an operation

#![warn(missing_docs)]

pub mod archive;
pub mod names;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use archive::{
    ArchiveBuilder, ArchiveEntry, ArchiveError, ArchiveReader, ArchiveResult, ArchiveTable,
    BuildOptions, BuildReport, ExtractOptions, ExtractReport, SkipReason, build, extract,
};
pub use names::{
    CrossReference, IndexSources, KeySet, LookupResult, NameIndex, NameIndexError,
    ResolveResult,
};

/// Binary codec capability shared by every format in this crate
///
/// External payload codecs (models, textures, string tables) plug into the
/// same shape: the archive only ever moves their bytes, it never looks inside.
pub trait BinaryFormat: Sized {
    /// Error produced by parsing or building
    type Error: std::error::Error;

    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Self::Error>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Self::Error>;

    /// Check that `data` survives a parse/build cycle unchanged
    fn round_trips(data: &[u8]) -> Result<bool, Self::Error> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        Ok(data == rebuilt.as_slice())
    }
}
