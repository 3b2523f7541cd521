//! Keyed access to a table/blob pair

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::table::{ArchiveEntry, ArchiveTable};
use hashpack_crypto::AssetKey;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Reader over a validated archive
///
/// The table is checked against the blob length when the reader is created,
/// so every entry handed out afterwards lies inside the blob.
pub struct ArchiveReader<R: Read + Seek> {
    /// Blob reader
    blob: R,
    /// Parsed table
    table: ArchiveTable,
    /// Key to entry position in `table.entries`
    lookup: HashMap<AssetKey, usize>,
}

impl ArchiveReader<BufReader<File>> {
    /// Open and validate an archive from its two files
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        table_path: P,
        blob_path: Q,
    ) -> ArchiveResult<Self> {
        let table = ArchiveTable::read_from_path(table_path.as_ref())?;
        let blob = File::open(blob_path.as_ref())?;
        debug!(
            table = %table_path.as_ref().display(),
            blob = %blob_path.as_ref().display(),
            entries = table.len(),
            "Opened archive"
        );
        Self::new(table, BufReader::new(blob))
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Wrap a parsed table and its blob, validating the layout
    pub fn new(table: ArchiveTable, mut blob: R) -> ArchiveResult<Self> {
        let blob_len = blob.seek(SeekFrom::End(0))?;
        table.validate_layout(blob_len)?;

        let lookup = table
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.key, i))
            .collect();

        Ok(Self {
            blob,
            table,
            lookup,
        })
    }

    /// The archive table
    pub fn table(&self) -> &ArchiveTable {
        &self.table
    }

    /// Entries in blob order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.table.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check whether `key` is stored
    pub fn contains(&self, key: AssetKey) -> bool {
        self.lookup.contains_key(&key)
    }

    /// Entry for `key`
    pub fn entry(&self, key: AssetKey) -> Option<&ArchiveEntry> {
        self.lookup.get(&key).map(|&i| &self.table.entries[i])
    }

    /// Payload for `key`, without padding
    pub fn read(&mut self, key: AssetKey) -> ArchiveResult<Option<Vec<u8>>> {
        let Some(entry) = self.entry(key).copied() else {
            return Ok(None);
        };
        self.read_entry(&entry).map(Some)
    }

    /// Payload described by `entry`
    pub fn read_entry(&mut self, entry: &ArchiveEntry) -> ArchiveResult<Vec<u8>> {
        self.blob.seek(SeekFrom::Start(u64::from(entry.offset)))?;
        let mut data = vec![0u8; entry.size as usize];
        self.blob.read_exact(&mut data).map_err(|e| {
            ArchiveError::FormatMismatch(format!(
                "payload {} at {}+{} unreadable: {e}",
                entry.key, entry.offset, entry.size
            ))
        })?;
        Ok(data)
    }
}
