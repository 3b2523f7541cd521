//! Unpacking archives back into directory trees
//!
//! Output is laid out so that building the extracted tree with the same
//! [`BuildOptions`] reproduces the archive's key set: entries with a known,
//! rebuildable name go to that path, everything else goes to
//! `<unknown dir>/<KEY>.<ext>`.

use crate::archive::builder::BuildOptions;
use crate::archive::constants::DEFAULT_UNKNOWN_EXTENSION;
use crate::archive::error::ArchiveResult;
use crate::archive::file::ArchiveReader;
use crate::names::NameIndex;
use hashpack_crypto::{AssetKey, hash_path};
use serde::Serialize;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

/// Settings for an extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Build settings the output should satisfy on a rebuild
    pub rebuild: BuildOptions,
    /// Extension for files written under the unknown directory
    pub unknown_extension: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            rebuild: BuildOptions::default(),
            unknown_extension: DEFAULT_UNKNOWN_EXTENSION.to_string(),
        }
    }
}

impl ExtractOptions {
    /// Extract for a rebuild with `rebuild`
    pub fn for_rebuild(rebuild: BuildOptions) -> Self {
        Self {
            rebuild,
            ..Self::default()
        }
    }

    /// Relative output path for `key` when no usable name is known
    pub fn unknown_path(&self, key: AssetKey) -> String {
        if self.unknown_extension.is_empty() {
            format!("{}/{key}", self.rebuild.unknown_dir)
        } else {
            format!(
                "{}/{key}.{}",
                self.rebuild.unknown_dir, self.unknown_extension
            )
        }
    }

    /// Check that `name` can be written below the output directory and
    /// hashes back to `key` when rebuilt
    pub fn is_rebuildable(&self, name: &str, key: AssetKey) -> bool {
        let segments_ok = !name.is_empty()
            && !name.contains('\\')
            && name
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        segments_ok
            && !Path::new(name).is_absolute()
            && name.split('/').next() != Some(self.rebuild.unknown_dir.as_str())
            && !self.rebuild.is_denied(name)
            && hash_path(name) == key
    }
}

/// Summary of an extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Entries written under their recovered name
    pub named: usize,
    /// Entries written under the unknown directory
    pub unnamed: usize,
    /// Known names that could not be used and fell back to the unknown directory
    pub rejected_names: usize,
    /// Payload bytes written
    pub bytes_written: u64,
}

impl ExtractReport {
    /// Total entries written
    pub fn total(&self) -> usize {
        self.named + self.unnamed
    }
}

/// Write every entry of `reader` below `out_dir`
///
/// Names come from `names` when given. Existing files are overwritten; the
/// caller decides whether `out_dir` may already contain data.
pub fn extract<R: Read + Seek>(
    reader: &mut ArchiveReader<R>,
    out_dir: &Path,
    names: Option<&NameIndex>,
    options: &ExtractOptions,
) -> ArchiveResult<ExtractReport> {
    info!(
        out_dir = %out_dir.display(),
        entries = reader.len(),
        with_names = names.is_some(),
        "Extracting archive"
    );
    std::fs::create_dir_all(out_dir)?;

    let mut report = ExtractReport::default();
    let entries = reader.entries().to_vec();

    for entry in &entries {
        let data = reader.read_entry(entry)?;
        let known = names.and_then(|index| index.name_of(entry.key));

        let named_target = match known {
            Some(name) if options.is_rebuildable(name, entry.key) => Some(name),
            Some(name) => {
                debug!(key = %entry.key, name, "Name cannot be rebuilt, using unknown path");
                report.rejected_names += 1;
                None
            }
            None => None,
        };

        if let Some(name) = named_target {
            match write_payload(&out_dir.join(name), &data) {
                Ok(()) => {
                    debug!(key = %entry.key, name, size = entry.size, "Extracted");
                    report.named += 1;
                    report.bytes_written += data.len() as u64;
                    continue;
                }
                Err(e) => {
                    warn!(key = %entry.key, name, error = %e, "Cannot write named file, using unknown path");
                    report.rejected_names += 1;
                }
            }
        }

        let relative = options.unknown_path(entry.key);
        write_payload(&out_dir.join(&relative), &data)?;
        debug!(key = %entry.key, path = %relative, size = entry.size, "Extracted");
        report.unnamed += 1;
        report.bytes_written += data.len() as u64;
    }

    info!(
        named = report.named,
        unnamed = report.unnamed,
        rejected_names = report.rejected_names,
        "Extraction complete"
    );
    Ok(report)
}

fn write_payload(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::ArchiveBuilder;
    use crate::names::CrossReference;
    use crate::test_utils::write_tree;
    use pretty_assertions::assert_eq;

    type FileReader = ArchiveReader<std::io::BufReader<std::fs::File>>;

    fn packed(files: &[(&str, &[u8])]) -> (tempfile::TempDir, FileReader) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        write_tree(&source, files);
        let table = dir.path().join("a.tbl");
        let blob = dir.path().join("a.blob");
        ArchiveBuilder::new(BuildOptions::default().with_alignment(16))
            .build(&source, &table, &blob)
            .unwrap();
        let reader = ArchiveReader::open(&table, &blob).unwrap();
        (dir, reader)
    }

    #[test]
    fn test_extract_without_names() {
        let (dir, mut reader) = packed(&[("a/b.dat", b"hello")]);
        let out = dir.path().join("out");

        let report = extract(&mut reader, &out, None, &ExtractOptions::default()).unwrap();
        assert_eq!(report.unnamed, 1);
        assert_eq!(report.bytes_written, 5);
        assert_eq!(std::fs::read(out.join("unknown/B6EF970C.bin")).unwrap(), b"hello");
    }

    #[test]
    fn test_extract_with_names() {
        let (dir, mut reader) = packed(&[("a/b.dat", b"hello"), ("models/hero.mdl", b"mdl")]);
        let mut xref = CrossReference::new();
        xref.add_string("a/b.dat");
        let index = NameIndex::from_parts(Vec::new(), Some(xref));
        let out = dir.path().join("out");

        let report = extract(&mut reader, &out, Some(&index), &ExtractOptions::default()).unwrap();
        assert_eq!(report.named, 1);
        assert_eq!(report.unnamed, 1);
        assert_eq!(report.total(), 2);
        assert_eq!(std::fs::read(out.join("a/b.dat")).unwrap(), b"hello");
        assert_eq!(std::fs::read(out.join("unknown/6B7D2162.bin")).unwrap(), b"mdl");
    }

    #[test]
    fn test_unsafe_names_fall_back() {
        let options = ExtractOptions::default();
        let key = hash_path("../escape.dat");
        assert!(!options.is_rebuildable("../escape.dat", key));
        assert!(!options.is_rebuildable("/abs.dat", hash_path("/abs.dat")));
        assert!(!options.is_rebuildable("a\\b.dat", hash_path("a\\b.dat")));
        assert!(!options.is_rebuildable("a//b.dat", hash_path("a//b.dat")));
        assert!(!options.is_rebuildable("unknown/x.dat", hash_path("unknown/x.dat")));
        assert!(!options.is_rebuildable("tool.xml", hash_path("tool.xml")));
        assert!(!options.is_rebuildable("a/b.dat", AssetKey::new(1)));
        assert!(options.is_rebuildable("a/b.dat", hash_path("a/b.dat")));
    }

    #[test]
    fn test_unknown_path() {
        let options = ExtractOptions::default();
        assert_eq!(options.unknown_path(AssetKey::new(0xDEAD_BEEF)), "unknown/DEADBEEF.bin");

        let bare = ExtractOptions {
            unknown_extension: String::new(),
            ..ExtractOptions::for_rebuild(BuildOptions::default().with_unknown_dir("raw"))
        };
        assert_eq!(bare.unknown_path(AssetKey::new(0xAB)), "raw/000000AB");
    }
}
