//! Archive builder: directory tree in, table/blob pair out
//!
//! The blob is written incrementally while the source tree is walked; the
//! table is serialized once every file has been processed. There is no
//! internal parallelism: offsets depend on the write cursor, so a single
//! coordinating flow owns both outputs.
//!
//! Both outputs are created or truncated unconditionally. Callers that need
//! an overwrite policy must check for existing files before building.
//! Outputs placed inside the source tree are left out of the walk.

use crate::archive::constants::{
    DEFAULT_ALIGNMENT, DEFAULT_DENIED_EXTENSIONS, DEFAULT_UNKNOWN_DIR, FILLER_BYTE,
};
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::table::{ArchiveEntry, ArchiveTable, align_up, is_valid_alignment};
use hashpack_crypto::{AssetKey, hash_path};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Settings for an archive build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Payload alignment in bytes (non-zero power of two)
    pub alignment: u32,
    /// First path segment whose files carry a literal hex key in their name
    /// (compared case-sensitively)
    pub unknown_dir: String,
    /// Extensions that are never archived (compared case-insensitively,
    /// without the leading dot)
    pub denied_extensions: Vec<String>,
    /// Abort on the first per-file problem instead of skipping the file
    pub fail_fast: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            unknown_dir: DEFAULT_UNKNOWN_DIR.to_string(),
            denied_extensions: DEFAULT_DENIED_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            fail_fast: false,
        }
    }
}

impl BuildOptions {
    /// Set the payload alignment
    pub fn with_alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the unknown-namespace directory name
    pub fn with_unknown_dir(mut self, unknown_dir: impl Into<String>) -> Self {
        self.unknown_dir = unknown_dir.into();
        self
    }

    /// Replace the extension denylist
    pub fn with_denied_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denied_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Abort on the first per-file problem
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Reject settings that cannot produce a valid archive
    pub fn validate(&self) -> ArchiveResult<()> {
        if !is_valid_alignment(self.alignment) {
            return Err(ArchiveError::InvalidAlignment(self.alignment));
        }
        Ok(())
    }

    /// Check whether a relative path has a denied extension
    pub fn is_denied(&self, relative: &str) -> bool {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        let Some((_, extension)) = name.rsplit_once('.') else {
            return false;
        };
        self.denied_extensions
            .iter()
            .any(|denied| denied.eq_ignore_ascii_case(extension))
    }

    /// Derive the key for a relative, `/`-separated path
    ///
    /// Files inside the unknown-namespace directory are keyed by the hex
    /// literal in their base name with the last extension removed; every
    /// other file is keyed by the hash of its relative path.
    pub fn derive_key(&self, relative: &str) -> Result<AssetKey, SkipReason> {
        match relative.split_once('/') {
            Some((first, rest)) if first == self.unknown_dir => {
                let name = rest.rsplit('/').next().unwrap_or(rest);
                let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
                AssetKey::from_literal(stem).map_err(|_| SkipReason::NotAHash)
            }
            _ => Ok(hash_path(relative)),
        }
    }
}

/// Why a file was left out of an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension is on the denylist
    DeniedExtension,
    /// Unknown-namespace name is not a 32-bit hex key
    NotAHash,
    /// Key was already written by an earlier file
    KeyCollision {
        /// Shared key
        key: AssetKey,
        /// Relative path of the file that was kept
        existing: String,
    },
    /// File or directory could not be read
    Unreadable {
        /// I/O error description
        error: String,
    },
    /// Path is not valid UTF-8 or escapes the source directory
    InvalidPath,
    /// Payload would push the blob past the 32-bit offset range
    TooLarge {
        /// Write cursor before the payload
        offset: u64,
        /// Payload length
        size: u64,
    },
}

impl SkipReason {
    /// Error equivalent used when the build runs in fail-fast mode
    ///
    /// Denylisted files are policy rather than failure, so they have none.
    pub fn to_error(&self, path: &str) -> Option<ArchiveError> {
        match self {
            Self::DeniedExtension => None,
            Self::NotAHash => Some(ArchiveError::MalformedHashLiteral(path.to_string())),
            Self::KeyCollision { key, existing } => Some(ArchiveError::KeyCollision {
                key: *key,
                path: path.to_string(),
                existing: existing.clone(),
            }),
            Self::Unreadable { error } => {
                Some(ArchiveError::Io(io::Error::other(format!("{path}: {error}"))))
            }
            Self::InvalidPath => Some(ArchiveError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unusable path: {path}"),
            ))),
            Self::TooLarge { offset, size } => Some(ArchiveError::BlobOverflow {
                offset: *offset,
                size: *size,
            }),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeniedExtension => write!(f, "denied extension"),
            Self::NotAHash => write!(f, "not a hash"),
            Self::KeyCollision { key, existing } => {
                write!(f, "key {key} already used by {existing}")
            }
            Self::Unreadable { error } => write!(f, "unreadable: {error}"),
            Self::InvalidPath => write!(f, "invalid path"),
            Self::TooLarge { offset, size } => {
                write!(f, "{size} bytes at offset {offset} overflow the blob")
            }
        }
    }
}

/// A file left out of an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Path relative to the source directory
    pub path: String,
    /// Why it was skipped
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Summary of an archive build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Entries written to the archive
    pub written: usize,
    /// Files skipped by the extension denylist
    pub denied: usize,
    /// Unknown-namespace files whose name is not a key
    pub not_a_hash: usize,
    /// Files dropped because their key was already written
    pub collisions: usize,
    /// Files or directories that could not be read, or had unusable paths
    pub unreadable: usize,
    /// Files that did not fit in the 32-bit blob
    pub too_large: usize,
    /// Final blob length in bytes
    pub blob_size: u64,
    /// Every skipped file, in enumeration order
    pub skipped: Vec<SkippedFile>,
}

impl BuildReport {
    /// Number of files left out for any reason
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of files left out because of a problem (denylist excluded)
    pub fn failed_count(&self) -> usize {
        self.not_a_hash + self.collisions + self.unreadable + self.too_large
    }

    /// Check that nothing but denylisted files was skipped
    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0
    }

    fn record(&mut self, path: String, reason: SkipReason) {
        match reason {
            SkipReason::DeniedExtension => self.denied += 1,
            SkipReason::NotAHash => self.not_a_hash += 1,
            SkipReason::KeyCollision { .. } => self.collisions += 1,
            SkipReason::Unreadable { .. } | SkipReason::InvalidPath => self.unreadable += 1,
            SkipReason::TooLarge { .. } => self.too_large += 1,
        }
        self.skipped.push(SkippedFile { path, reason });
    }
}

/// Sequential writer for the blob half of an archive
///
/// Every payload is followed by [`FILLER_BYTE`] padding up to the next
/// multiple of the alignment.
pub struct BlobWriter<W: Write> {
    /// Underlying writer
    writer: W,
    /// Current write position (always aligned between payloads)
    position: u64,
    /// Payload alignment
    alignment: u32,
}

impl<W: Write> BlobWriter<W> {
    /// Create a new blob writer
    pub fn new(writer: W, alignment: u32) -> ArchiveResult<Self> {
        if !is_valid_alignment(alignment) {
            return Err(ArchiveError::InvalidAlignment(alignment));
        }
        Ok(Self {
            writer,
            position: 0,
            alignment,
        })
    }

    /// Append a payload and its padding
    ///
    /// Returns the payload's `(offset, size)`. Nothing is written if the
    /// padded payload would end beyond the 32-bit offset range.
    pub fn append(&mut self, data: &[u8]) -> ArchiveResult<(u32, u32)> {
        let size = data.len() as u64;
        let padded_end = align_up(self.position + size, self.alignment);
        if padded_end > u64::from(u32::MAX) {
            return Err(ArchiveError::BlobOverflow {
                offset: self.position,
                size,
            });
        }

        let offset = self.position as u32;
        self.writer.write_all(data)?;

        let padding = padded_end - self.position - size;
        io::copy(&mut io::repeat(FILLER_BYTE).take(padding), &mut self.writer)?;
        self.position = padded_end;

        Ok((offset, size as u32))
    }

    /// Current write position (total bytes written)
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Flush and return the writer with the final blob length
    pub fn finish(mut self) -> ArchiveResult<(W, u64)> {
        self.writer.flush()?;
        Ok((self.writer, self.position))
    }
}

impl BlobWriter<BufWriter<File>> {
    /// Create or truncate a blob file
    pub fn create<P: AsRef<Path>>(path: P, alignment: u32) -> ArchiveResult<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), alignment)
    }
}

/// Builds archives from directory trees
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    options: BuildOptions,
}

impl ArchiveBuilder {
    /// Create a builder with the given options
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build `table_out` and `blob_out` from every regular file below
    /// `source_dir`
    ///
    /// Per-file problems are skipped and counted in the returned report
    /// (unless fail-fast is set). An unreadable source directory or an I/O
    /// failure on either output aborts the build.
    pub fn build(
        &self,
        source_dir: &Path,
        table_out: &Path,
        blob_out: &Path,
    ) -> ArchiveResult<BuildReport> {
        self.options.validate()?;
        check_source_dir(source_dir)?;

        info!(
            source = %source_dir.display(),
            table = %table_out.display(),
            blob = %blob_out.display(),
            alignment = self.options.alignment,
            "Building archive"
        );

        let outputs: Vec<String> = [table_out, blob_out]
            .into_iter()
            .filter_map(|output| output_relative(source_dir, output))
            .collect();
        if !outputs.is_empty() {
            debug!(outputs = ?outputs, "Outputs are inside the source tree and will not be archived");
        }

        let mut blob = BlobWriter::create(blob_out, self.options.alignment)?;
        let (table, mut report) = self.pack_excluding(source_dir, &mut blob, &outputs)?;
        let (_, blob_size) = blob.finish()?;
        report.blob_size = blob_size;

        table.write_to_path(table_out)?;

        info!(
            written = report.written,
            skipped = report.skipped_count(),
            collisions = report.collisions,
            blob_size,
            "Archive build complete"
        );
        if report.collisions > 0 {
            warn!(
                collisions = report.collisions,
                "Files with colliding keys were omitted; the first file in name order was kept"
            );
        }

        Ok(report)
    }

    /// Pack every regular file below `source_dir` into `blob`
    ///
    /// Files are visited sorted by name at every directory level, which fixes
    /// both offsets and the collision winner for a given tree.
    pub fn pack<W: Write>(
        &self,
        source_dir: &Path,
        blob: &mut BlobWriter<W>,
    ) -> ArchiveResult<(ArchiveTable, BuildReport)> {
        self.pack_excluding(source_dir, blob, &[])
    }

    /// Pack like [`pack`](Self::pack), leaving out the relative paths in
    /// `excluded`
    fn pack_excluding<W: Write>(
        &self,
        source_dir: &Path,
        blob: &mut BlobWriter<W>,
        excluded: &[String],
    ) -> ArchiveResult<(ArchiveTable, BuildReport)> {
        let mut packer = Packer {
            options: &self.options,
            blob,
            table: ArchiveTable::new(self.options.alignment),
            report: BuildReport::default(),
            written: HashMap::new(),
        };

        for item in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    let path = e
                        .path()
                        .and_then(|p| relative_path(source_dir, p))
                        .unwrap_or_else(|| source_dir.display().to_string());
                    packer.skip(
                        path,
                        SkipReason::Unreadable {
                            error: e.to_string(),
                        },
                    )?;
                    continue;
                }
            };

            // Links are read through but never descended
            let file_type = item.file_type();
            if !file_type.is_file() && !file_type.is_symlink() {
                continue;
            }

            match relative_path(source_dir, item.path()) {
                Some(relative) if excluded.contains(&relative) => {
                    debug!(path = %relative, "Skipping build output");
                }
                Some(relative) => packer.add_file(item.path(), relative)?,
                None => packer.skip(item.path().display().to_string(), SkipReason::InvalidPath)?,
            }
        }

        Ok((packer.table, packer.report))
    }
}

/// Build an archive with default options and the given alignment
pub fn build(
    source_dir: &Path,
    table_out: &Path,
    blob_out: &Path,
    alignment: u32,
) -> ArchiveResult<BuildReport> {
    ArchiveBuilder::new(BuildOptions::default().with_alignment(alignment))
        .build(source_dir, table_out, blob_out)
}

/// Per-build mutable state
struct Packer<'a, W: Write> {
    options: &'a BuildOptions,
    blob: &'a mut BlobWriter<W>,
    table: ArchiveTable,
    report: BuildReport,
    /// Keys already written, with the path that claimed them
    written: HashMap<AssetKey, String>,
}

impl<W: Write> Packer<'_, W> {
    fn add_file(&mut self, path: &Path, relative: String) -> ArchiveResult<()> {
        if self.options.is_denied(&relative) {
            return self.skip(relative, SkipReason::DeniedExtension);
        }

        let key = match self.options.derive_key(&relative) {
            Ok(key) => key,
            Err(reason) => return self.skip(relative, reason),
        };

        if let Some(existing) = self.written.get(&key) {
            let reason = SkipReason::KeyCollision {
                key,
                existing: existing.clone(),
            };
            return self.skip(relative, reason);
        }

        let data = match read_regular_file(path) {
            Ok(data) => data,
            Err(e) => {
                return self.skip(
                    relative,
                    SkipReason::Unreadable {
                        error: e.to_string(),
                    },
                );
            }
        };

        let (offset, size) = match self.blob.append(&data) {
            Ok(placed) => placed,
            Err(ArchiveError::BlobOverflow { offset, size }) => {
                return self.skip(relative, SkipReason::TooLarge { offset, size });
            }
            Err(e) => return Err(e),
        };

        debug!(path = %relative, key = %key, offset, size, "Archived file");
        self.table.entries.push(ArchiveEntry::new(key, offset, size));
        self.written.insert(key, relative);
        self.report.written += 1;
        Ok(())
    }

    fn skip(&mut self, path: String, reason: SkipReason) -> ArchiveResult<()> {
        if self.options.fail_fast
            && let Some(err) = reason.to_error(&path)
        {
            return Err(err);
        }

        match reason {
            SkipReason::DeniedExtension => debug!(path = %path, "Skipping file: {reason}"),
            _ => warn!(path = %path, "Skipping file: {reason}"),
        }
        self.report.record(path, reason);
        Ok(())
    }
}

/// Read `path` if it is, or links to, a regular file
fn read_regular_file(path: &Path) -> io::Result<Vec<u8>> {
    if !std::fs::metadata(path)?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    std::fs::read(path)
}

/// Relative path of `output` if it lies inside `source_dir`
fn output_relative(source_dir: &Path, output: &Path) -> Option<String> {
    let root = std::fs::canonicalize(source_dir).ok()?;
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let resolved = std::fs::canonicalize(parent).ok()?.join(output.file_name()?);
    relative_path(&root, &resolved)
}

/// Fail early if the source tree cannot be listed at all
fn check_source_dir(source_dir: &Path) -> ArchiveResult<()> {
    let metadata =
        std::fs::metadata(source_dir).map_err(|source| ArchiveError::SourceUnreadable {
            path: source_dir.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(ArchiveError::NotADirectory(source_dir.to_path_buf()));
    }
    std::fs::read_dir(source_dir).map_err(|source| ArchiveError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Path of `path` relative to `root`, joined with `/`
///
/// Returns `None` for non-UTF-8 names or paths that do not stay below `root`.
fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_str()?),
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
