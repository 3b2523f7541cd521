//! Precomputed key set files
//!
//! A key set is a headerless run of little-endian `u32` keys, one per known
//! string. Order carries no meaning; the file length must be a multiple of 4.

use crate::BinaryFormat;
use crate::names::error::{NameIndexError, NameIndexResult};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};
use hashpack_crypto::{AssetKey, hash_path};
use std::collections::HashSet;
use std::path::Path;

/// On-disk layout: `count` keys and nothing else
#[binrw]
#[brw(little)]
#[br(import(count: usize))]
struct RawKeys {
    #[br(count = count)]
    keys: Vec<AssetKey>,
}

/// Set of precomputed keys with its on-disk order preserved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    /// Keys in file order (duplicates kept so the file round-trips)
    keys: Vec<AssetKey>,
    /// Membership index
    members: HashSet<AssetKey>,
}

impl KeySet {
    /// Create an empty key set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a key set from keys, keeping their order
    pub fn from_keys<I: IntoIterator<Item = AssetKey>>(keys: I) -> Self {
        let keys: Vec<AssetKey> = keys.into_iter().collect();
        let members = keys.iter().copied().collect();
        Self { keys, members }
    }

    /// Hash every name and collect the keys
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(hash_path(name.as_ref()));
        }
        set
    }

    /// Add a key; returns `false` if it was already present
    pub fn insert(&mut self, key: AssetKey) -> bool {
        if !self.members.insert(key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Check membership
    pub fn contains(&self, key: AssetKey) -> bool {
        self.members.contains(&key)
    }

    /// Number of keys in file order, duplicates included
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Number of distinct keys
    pub fn unique_len(&self) -> usize {
        self.members.len()
    }

    /// Check if the set has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in file order
    pub fn keys(&self) -> &[AssetKey] {
        &self.keys
    }

    /// Read and parse a key set file
    pub fn open<P: AsRef<Path>>(path: P) -> NameIndexResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| NameIndexError::io(path, e))?;
        Self::parse(&data)
    }

    /// Serialize and write a key set file, replacing any existing file
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> NameIndexResult<()> {
        let path = path.as_ref();
        let data = self.build()?;
        std::fs::write(path, data).map_err(|e| NameIndexError::io(path, e))
    }
}

impl BinaryFormat for KeySet {
    type Error = NameIndexError;

    fn parse(data: &[u8]) -> NameIndexResult<Self> {
        if data.len() % 4 != 0 {
            return Err(NameIndexError::FormatMismatch(format!(
                "key set is {} bytes, not a multiple of 4",
                data.len()
            )));
        }

        let raw = RawKeys::read_args(&mut Cursor::new(data), (data.len() / 4,))?;
        Ok(Self::from_keys(raw.keys))
    }

    fn build(&self) -> NameIndexResult<Vec<u8>> {
        let raw = RawKeys {
            keys: self.keys.clone(),
        };
        let mut cursor = Cursor::new(Vec::with_capacity(self.keys.len() * 4));
        raw.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

impl FromIterator<AssetKey> for KeySet {
    fn from_iter<I: IntoIterator<Item = AssetKey>>(iter: I) -> Self {
        Self::from_keys(iter)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::test_round_trip;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_little_endian() {
        let data = [0x0C, 0x97, 0xEF, 0xB6, 0xEF, 0xBE, 0xAD, 0xDE];
        let set = KeySet::parse(&data).unwrap();
        assert_eq!(
            set.keys(),
            &[AssetKey::new(0xB6EF_970C), AssetKey::new(0xDEAD_BEEF)]
        );
        assert!(set.contains(hash_path("a/b.dat")));
        assert!(!set.contains(AssetKey::new(0xEFBE_ADDE)));
    }

    #[test]
    fn test_parse_rejects_partial_key() {
        let err = KeySet::parse(&[1, 2, 3, 4, 5]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_empty_file() {
        let set = KeySet::parse(&[]).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.build().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_from_names() {
        let set = KeySet::from_names(["a/b.dat", "models/hero.mdl", "a/b.dat"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(AssetKey::new(0x6B7D_2162)));
    }

    #[test]
    fn test_duplicates_survive_round_trip() {
        let set = KeySet::from_keys([AssetKey::new(1), AssetKey::new(2), AssetKey::new(1)]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.unique_len(), 2);
        test_round_trip(&set);
    }

    #[test]
    fn test_file_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.keys");
        let set = KeySet::from_names(["textures/hero.dds"]);
        set.write_to_path(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x09, 0x0B, 0xE2, 0x1C]);
        assert_eq!(KeySet::open(&path).unwrap(), set);

        let missing = KeySet::open(dir.path().join("missing.keys")).unwrap_err();
        assert!(matches!(missing, NameIndexError::Io { .. }));
    }

    proptest! {
        #[test]
        fn prop_membership_matches_input(keys in prop::collection::vec(any::<u32>(), 0..64)) {
            let set: KeySet = keys.iter().copied().map(AssetKey::new).collect();
            let parsed = KeySet::parse(&set.build().unwrap()).unwrap();
            for key in &keys {
                prop_assert!(parsed.contains(AssetKey::new(*key)));
            }
            prop_assert_eq!(parsed.len(), keys.len());
        }
    }
}
