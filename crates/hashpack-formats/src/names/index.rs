//! In-memory name index built from key sets and a cross-reference dataset

use crate::names::error::NameIndexResult;
use crate::names::key_set::KeySet;
use crate::names::xref::CrossReference;
use hashpack_crypto::AssetKey;
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dataset files to load into a [`NameIndex`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSources {
    /// Key set files, reported in this order
    pub key_sets: Vec<PathBuf>,
    /// Optional cross-reference file
    pub cross_reference: Option<PathBuf>,
}

impl IndexSources {
    /// No sources
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key set file
    pub fn with_key_set(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_sets.push(path.into());
        self
    }

    /// Set the cross-reference file
    pub fn with_cross_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.cross_reference = Some(path.into());
        self
    }

    /// Check if no dataset is configured
    pub fn is_empty(&self) -> bool {
        self.key_sets.is_empty() && self.cross_reference.is_none()
    }
}

/// Counts gathered while loading an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Key sets loaded
    pub key_sets: usize,
    /// Keys across all key sets (duplicates included)
    pub set_keys: usize,
    /// Usage records kept
    pub usage_records: usize,
    /// Usage records dropped because their key was already seen
    pub duplicate_usage_records: usize,
    /// Names kept
    pub strings: usize,
    /// Repeated copies of an already known name
    pub duplicate_strings: usize,
    /// Different names dropped because their key was already taken
    pub string_conflicts: usize,
    /// Names that are not valid UTF-8 (kept, displayed lossily)
    pub non_utf8_strings: usize,
}

/// One asset referencing a resolved key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    /// Key of the referencing asset
    pub key: AssetKey,
    /// Its name, when known
    pub name: Option<String>,
}

/// Everything the index knows about one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveResult {
    /// Queried key
    pub key: AssetKey,
    /// Identifiers of the key sets containing `key`, in load order
    pub found_in_sets: Vec<String>,
    /// Plaintext name hashing to `key`
    pub literal_name: Option<String>,
    /// Assets referencing `key`, in dataset order
    pub usages: Vec<Usage>,
}

impl ResolveResult {
    fn empty(key: AssetKey) -> Self {
        Self {
            key,
            found_in_sets: Vec::new(),
            literal_name: None,
            usages: Vec::new(),
        }
    }

    /// Check if no source knows the key
    pub fn is_empty(&self) -> bool {
        self.found_in_sets.is_empty() && self.literal_name.is_none() && self.usages.is_empty()
    }
}

/// Results for a key and its byte-swapped form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// Result for the key as given
    pub forward: ResolveResult,
    /// Result for the byte-reversed key
    pub swapped: ResolveResult,
}

impl LookupResult {
    /// Check if only the byte-swapped form is known
    ///
    /// This usually means the key was produced or read with the opposite
    /// endianness.
    pub fn swapped_only_hit(&self) -> bool {
        self.forward.is_empty() && !self.swapped.is_empty()
    }

    /// Check if neither form is known
    pub fn is_miss(&self) -> bool {
        self.forward.is_empty() && self.swapped.is_empty()
    }
}

/// Read-only resolver from keys to names, set memberships and usages
///
/// Built once, then safe to query from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    /// Key sets with their identifiers, in load order
    sets: Vec<(String, KeySet)>,
    /// Key to referencing keys
    usages: HashMap<AssetKey, Vec<AssetKey>>,
    /// Key to plaintext name
    names: HashMap<AssetKey, String>,
    report: LoadReport,
}

impl NameIndex {
    /// Load every configured dataset
    ///
    /// Each key set is identified by its file name. An unreadable or
    /// malformed dataset aborts the load; duplicates inside the
    /// cross-reference are counted and dropped.
    pub fn load(sources: &IndexSources) -> NameIndexResult<Self> {
        let mut sets = Vec::with_capacity(sources.key_sets.len());
        for path in &sources.key_sets {
            let set = KeySet::open(path)?;
            debug!(path = %path.display(), keys = set.len(), "Loaded key set");
            let identifier = set_identifier(path, &sets);
            sets.push((identifier, set));
        }

        let xref = match &sources.cross_reference {
            Some(path) => {
                let xref = CrossReference::open(path)?;
                debug!(
                    path = %path.display(),
                    records = xref.records.len(),
                    strings = xref.strings.len(),
                    "Loaded cross-reference"
                );
                Some(xref)
            }
            None => None,
        };

        let index = Self::from_parts(sets, xref);
        info!(
            key_sets = index.report.key_sets,
            set_keys = index.report.set_keys,
            names = index.report.strings,
            usage_records = index.report.usage_records,
            "Name index loaded"
        );
        Ok(index)
    }

    /// Build an index from already parsed datasets
    pub fn from_parts(sets: Vec<(String, KeySet)>, xref: Option<CrossReference>) -> Self {
        let mut report = LoadReport {
            key_sets: sets.len(),
            set_keys: sets.iter().map(|(_, set)| set.len()).sum(),
            ..LoadReport::default()
        };
        let mut usages = HashMap::new();
        let mut names: HashMap<AssetKey, String> = HashMap::new();

        if let Some(xref) = xref {
            for record in xref.records {
                match usages.entry(record.key) {
                    Entry::Occupied(_) => report.duplicate_usage_records += 1,
                    Entry::Vacant(slot) => {
                        let mut users = record.usages;
                        dedup_in_order(&mut users);
                        slot.insert(users);
                        report.usage_records += 1;
                    }
                }
            }

            for string in xref.strings {
                let key = string.key();
                let name = match String::from_utf8(string.bytes) {
                    Ok(name) => name,
                    Err(e) => {
                        report.non_utf8_strings += 1;
                        String::from_utf8_lossy(e.as_bytes()).into_owned()
                    }
                };
                match names.entry(key) {
                    Entry::Occupied(existing) if *existing.get() == name => {
                        report.duplicate_strings += 1;
                    }
                    Entry::Occupied(existing) => {
                        warn!(
                            key = %key,
                            kept = %existing.get(),
                            dropped = %name,
                            "Name conflicts with an earlier name for the same key"
                        );
                        report.string_conflicts += 1;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(name);
                        report.strings += 1;
                    }
                }
            }
        }

        Self {
            sets,
            usages,
            names,
            report,
        }
    }

    /// Everything known about `key`
    pub fn resolve(&self, key: AssetKey) -> ResolveResult {
        let mut result = ResolveResult::empty(key);

        result.found_in_sets = self
            .sets
            .iter()
            .filter(|(_, set)| set.contains(key))
            .map(|(id, _)| id.clone())
            .collect();

        result.literal_name = self.names.get(&key).cloned();

        if let Some(users) = self.usages.get(&key) {
            result.usages = users
                .iter()
                .map(|&user| Usage {
                    key: user,
                    name: self.names.get(&user).cloned(),
                })
                .collect();
        }

        result
    }

    /// Resolve a key and its byte-swapped form
    pub fn lookup_key(&self, key: AssetKey) -> LookupResult {
        LookupResult {
            forward: self.resolve(key),
            swapped: self.resolve(key.swap_bytes()),
        }
    }

    /// Parse a hexadecimal query (optional `0x`, up to eight digits) and
    /// resolve it in both byte orders
    pub fn lookup(&self, raw: &str) -> NameIndexResult<LookupResult> {
        let key = AssetKey::parse_query(raw)?;
        Ok(self.lookup_key(key))
    }

    /// Plaintext name for `key`, if the cross-reference has one
    pub fn name_of(&self, key: AssetKey) -> Option<&str> {
        self.names.get(&key).map(String::as_str)
    }

    /// Identifiers of the loaded key sets, in load order
    pub fn set_identifiers(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|(id, _)| id.as_str())
    }

    /// Counts gathered while loading
    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}

/// File name of `path`, or the full path when an earlier set already took
/// that name
fn set_identifier(path: &Path, loaded: &[(String, KeySet)]) -> String {
    let full = || path.display().to_string();
    match path.file_name() {
        Some(name) => {
            let name = name.to_string_lossy();
            if loaded.iter().any(|(id, _)| *id == name) {
                full()
            } else {
                name.into_owned()
            }
        }
        None => full(),
    }
}

fn dedup_in_order(keys: &mut Vec<AssetKey>) {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.retain(|key| seen.insert(*key));
}
