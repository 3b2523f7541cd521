//! Hash-addressed archives: a table file plus a blob file
//!
//! An archive is two files that always travel together:
//!
//! 1. **Table**: alignment, entry count and fixed-width `{key, offset, size}`
//!    records (see [`ArchiveTable`])
//! 2. **Blob**: raw payload bytes, each padded with `'0'` (0x30) up to the
//!    table's alignment
//!
//! ```text
//! Content Resolution Flow:
//! path → hash → AssetKey → ArchiveTable → (offset, size) → Blob → bytes
//! ```
//!
//! # Building
//!
//! [`ArchiveBuilder`] walks a source directory in byte-wise file name order,
//! derives a key for every file and appends the payloads to the blob. Files
//! below the unknown-namespace directory (default `unknown/`) carry their key
//! in their name (`unknown/DEADBEEF.bin`) instead of being hashed.
//!
//! Collisions are first-writer-wins: a later file whose key was already
//! written is skipped and reported, never overwritten. Because that outcome
//! depends on enumeration order, the order is fixed (sorted by file name at
//! every directory level) and every skipped file is listed in the
//! [`BuildReport`].
//!
//! # Usage Examples
//!
//! ## Build an archive
//!
//! ```rust,no_run
//! use hashpack_formats::archive::{ArchiveBuilder, BuildOptions};
//!
//! let builder = ArchiveBuilder::new(BuildOptions::default().with_alignment(2048));
//! let report = builder.build("assets".as_ref(), "out.tbl".as_ref(), "out.blob".as_ref())?;
//! println!("{} written, {} skipped", report.written, report.skipped_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Read content back
//!
//! ```rust,no_run
//! use hashpack_crypto::hash_path;
//! use hashpack_formats::archive::ArchiveReader;
//!
//! let mut reader = ArchiveReader::open("out.tbl", "out.blob")?;
//! if let Some(bytes) = reader.read(hash_path("textures/hero.dds"))? {
//!     println!("{} bytes", bytes.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod error;
mod extract;
mod file;
mod table;

pub use builder::{
    ArchiveBuilder, BlobWriter, BuildOptions, BuildReport, SkipReason, SkippedFile, build,
};
pub use error::{ArchiveError, ArchiveResult};
pub use extract::{ExtractOptions, ExtractReport, extract};
pub use file::ArchiveReader;
pub use table::{ArchiveEntry, ArchiveTable, align_up, is_valid_alignment};

/// Archive format constants
pub mod constants {
    /// Byte used to pad each payload up to the alignment boundary (ASCII `'0'`)
    pub const FILLER_BYTE: u8 = 0x30;

    /// Size of the table header (alignment + entry count)
    pub const HEADER_SIZE: usize = 8;

    /// Size of each table entry (key + offset + size)
    pub const ENTRY_SIZE: usize = 12;

    /// Alignment used when none is configured
    pub const DEFAULT_ALIGNMENT: u32 = 2048;

    /// First path segment marking files whose name is a literal key
    pub const DEFAULT_UNKNOWN_DIR: &str = "unknown";

    /// Extension given to unnamed payloads on extraction
    pub const DEFAULT_UNKNOWN_EXTENSION: &str = "bin";

    /// Tooling metadata never packed into an archive (compared case-insensitively)
    pub const DEFAULT_DENIED_EXTENSIONS: &[&str] = &["xml", "dll", "exe", "pdb"];
}
