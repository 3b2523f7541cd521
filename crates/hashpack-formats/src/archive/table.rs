//! Archive table parsing, building and layout validation
//!
//! ## Table Format
//!
//! All integers are little-endian:
//!
//! ```text
//! alignment   u32
//! entry_count u32
//! entries     entry_count x { key u32, offset u32, size u32 }
//! ```
//!
//! Entries appear in the order their payloads were appended to the blob. Each
//! payload is padded with [`FILLER_BYTE`](super::constants::FILLER_BYTE) up to
//! the next multiple of `alignment`, so an entry's padded end is exactly the
//! next entry's offset, and the last padded end is the blob length.

use crate::BinaryFormat;
use crate::archive::error::{ArchiveError, ArchiveResult};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};
use hashpack_crypto::AssetKey;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use super::constants::{ENTRY_SIZE, HEADER_SIZE};

/// Location of one payload inside the blob
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[brw(little)]
pub struct ArchiveEntry {
    /// Asset key
    pub key: AssetKey,
    /// Byte offset of the payload in the blob
    pub offset: u32,
    /// Payload length in bytes, excluding padding
    pub size: u32,
}

impl ArchiveEntry {
    /// Create a new archive entry
    pub fn new(key: AssetKey, offset: u32, size: u32) -> Self {
        Self { key, offset, size }
    }

    /// End of the payload (exclusive), before padding
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }

    /// End of the payload after padding to `alignment`
    pub fn padded_end(&self, alignment: u32) -> u64 {
        align_up(self.end(), alignment)
    }
}

/// Table half of an archive: alignment plus ordered entries
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveTable {
    /// Payload alignment in bytes (power of two)
    pub alignment: u32,

    #[br(temp)]
    #[bw(calc = entries.len() as u32)]
    entry_count: u32,

    /// Entries in blob order
    #[br(count = entry_count)]
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveTable {
    /// Create an empty table
    pub fn new(alignment: u32) -> Self {
        Self {
            alignment,
            entries: Vec::new(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for `key` (linear scan; use an
    /// [`ArchiveReader`](super::ArchiveReader) for repeated lookups)
    pub fn find(&self, key: AssetKey) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Blob length implied by the entries and alignment
    pub fn expected_blob_len(&self) -> u64 {
        self.entries
            .last()
            .map_or(0, |entry| entry.padded_end(self.alignment))
    }

    /// Read and parse a table file
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> ArchiveResult<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    /// Serialize and write a table file, replacing any existing file
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> ArchiveResult<()> {
        let data = self.build()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Check the table against a blob of `blob_len` bytes
    ///
    /// Verifies that the alignment is a power of two, every offset is
    /// aligned, padded regions are contiguous from offset zero, keys are
    /// unique and the last padded region ends at `blob_len`.
    pub fn validate_layout(&self, blob_len: u64) -> ArchiveResult<()> {
        if !is_valid_alignment(self.alignment) {
            return Err(ArchiveError::FormatMismatch(format!(
                "table alignment {} is not a power of two",
                self.alignment
            )));
        }

        let mut cursor = 0u64;
        let mut keys = HashSet::with_capacity(self.entries.len());

        for (i, entry) in self.entries.iter().enumerate() {
            if u64::from(entry.offset) != cursor {
                return Err(ArchiveError::FormatMismatch(format!(
                    "entry {i} ({}) starts at {}, expected {cursor}",
                    entry.key, entry.offset
                )));
            }
            if !keys.insert(entry.key) {
                return Err(ArchiveError::FormatMismatch(format!(
                    "entry {i} repeats key {}",
                    entry.key
                )));
            }
            cursor = entry.padded_end(self.alignment);
        }

        if cursor != blob_len {
            return Err(ArchiveError::FormatMismatch(format!(
                "blob is {blob_len} bytes, table describes {cursor}"
            )));
        }

        Ok(())
    }
}

impl BinaryFormat for ArchiveTable {
    type Error = ArchiveError;

    fn parse(data: &[u8]) -> ArchiveResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ArchiveError::FormatMismatch(format!(
                "table is {} bytes, header needs {HEADER_SIZE}",
                data.len()
            )));
        }

        // Check the declared count against the file length before allocating
        let declared = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let expected = declared
            .checked_mul(ENTRY_SIZE)
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE));
        if expected != Some(data.len()) {
            return Err(ArchiveError::FormatMismatch(format!(
                "table declares {declared} entries but is {} bytes",
                data.len()
            )));
        }

        let table = Self::read(&mut Cursor::new(data))?;
        Ok(table)
    }

    fn build(&self) -> ArchiveResult<Vec<u8>> {
        if u32::try_from(self.entries.len()).is_err() {
            return Err(ArchiveError::FormatMismatch(format!(
                "{} entries exceed the 32-bit entry count",
                self.entries.len()
            )));
        }

        let mut cursor = Cursor::new(Vec::with_capacity(
            HEADER_SIZE + self.entries.len() * ENTRY_SIZE,
        ));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Check that `alignment` is a non-zero power of two
pub fn is_valid_alignment(alignment: u32) -> bool {
    alignment.is_power_of_two()
}

/// Round `value` up to the next multiple of `alignment` (a power of two)
pub fn align_up(value: u64, alignment: u32) -> u64 {
    let mask = u64::from(alignment.max(1)) - 1;
    (value + mask) & !mask
}
