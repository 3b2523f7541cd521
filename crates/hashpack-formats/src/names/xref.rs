//! Cross-reference dataset files
//!
//! ## Format
//!
//! All integers are little-endian:
//!
//! ```text
//! record_count u32
//! records      record_count x { key u32, usage_count u32, usages u32 x usage_count }
//! string_count u32
//! strings      string_count x { length u32, bytes u8 x length }
//! ```
//!
//! Strings carry no key on disk; the key of each string is its hash, computed
//! when the dataset is loaded into a [`NameIndex`](super::NameIndex).

use crate::BinaryFormat;
use crate::names::error::{NameIndexError, NameIndexResult};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite, binrw};
use hashpack_crypto::{AssetKey, hash};
use std::borrow::Cow;
use std::path::Path;

/// Keys known to reference one asset
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Referenced asset
    pub key: AssetKey,

    #[br(temp)]
    #[bw(calc = usages.len() as u32)]
    usage_count: u32,

    /// Assets that reference `key`
    #[br(count = usage_count)]
    pub usages: Vec<AssetKey>,
}

impl UsageRecord {
    /// Create a record with no usages
    pub fn new(key: AssetKey) -> Self {
        Self {
            key,
            usages: Vec::new(),
        }
    }
}

/// Length-prefixed plaintext name
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameString {
    #[br(temp)]
    #[bw(calc = bytes.len() as u32)]
    length: u32,

    /// Raw name bytes as hashed
    #[br(count = length)]
    pub bytes: Vec<u8>,
}

impl NameString {
    /// Wrap a name
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Self { bytes: name.into() }
    }

    /// Key of this name
    pub fn key(&self) -> AssetKey {
        hash(&self.bytes)
    }

    /// Name as text, with invalid UTF-8 replaced
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Usage records plus a list of known names
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossReference {
    #[br(temp)]
    #[bw(calc = records.len() as u32)]
    record_count: u32,

    /// Usage records in file order
    #[br(count = record_count)]
    pub records: Vec<UsageRecord>,

    #[br(temp)]
    #[bw(calc = strings.len() as u32)]
    string_count: u32,

    /// Names in file order
    #[br(count = string_count)]
    pub strings: Vec<NameString>,
}

impl CrossReference {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user` references `key`
    ///
    /// Returns `false` if the pair was already recorded.
    pub fn add_usage(&mut self, key: AssetKey, user: AssetKey) -> bool {
        let record = match self.records.iter().position(|r| r.key == key) {
            Some(i) => &mut self.records[i],
            None => {
                self.records.push(UsageRecord::new(key));
                let last = self.records.len() - 1;
                &mut self.records[last]
            }
        };
        if record.usages.contains(&user) {
            return false;
        }
        record.usages.push(user);
        true
    }

    /// Add a name and return its key
    pub fn add_string(&mut self, name: &str) -> AssetKey {
        let string = NameString::new(name);
        let key = string.key();
        self.strings.push(string);
        key
    }

    /// Read and parse a cross-reference file
    pub fn open<P: AsRef<Path>>(path: P) -> NameIndexResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| NameIndexError::io(path, e))?;
        Self::parse(&data)
    }

    /// Serialize and write a cross-reference file, replacing any existing file
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> NameIndexResult<()> {
        let path = path.as_ref();
        let data = self.build()?;
        std::fs::write(path, data).map_err(|e| NameIndexError::io(path, e))
    }
}

impl BinaryFormat for CrossReference {
    type Error = NameIndexError;

    fn parse(data: &[u8]) -> NameIndexResult<Self> {
        let mut cursor = Cursor::new(data);
        let xref = Self::read(&mut cursor)?;

        let consumed = cursor.position();
        if consumed != data.len() as u64 {
            return Err(NameIndexError::FormatMismatch(format!(
                "cross-reference has {} trailing bytes",
                data.len() as u64 - consumed
            )));
        }

        Ok(xref)
    }

    fn build(&self) -> NameIndexResult<Vec<u8>> {
        let too_long = self.records.iter().any(|r| u32::try_from(r.usages.len()).is_err())
            || self.strings.iter().any(|s| u32::try_from(s.bytes.len()).is_err());
        if too_long {
            return Err(NameIndexError::FormatMismatch(
                "a record or string exceeds the 32-bit length field".to_string(),
            ));
        }

        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::test_round_trip;
    use hashpack_crypto::hash_path;
    use pretty_assertions::assert_eq;

    fn sample() -> CrossReference {
        let mut xref = CrossReference::new();
        let texture = xref.add_string("textures/hero.dds");
        let model = xref.add_string("models/hero.mdl");
        xref.add_usage(texture, model);
        xref
    }

    #[test]
    fn test_binary_layout() {
        let data = sample().build().unwrap();
        let mut expected = vec![
            0x01, 0x00, 0x00, 0x00, // record count
            0x09, 0x0B, 0xE2, 0x1C, // key: textures/hero.dds
            0x01, 0x00, 0x00, 0x00, // usage count
            0x62, 0x21, 0x7D, 0x6B, // usage: models/hero.mdl
            0x02, 0x00, 0x00, 0x00, // string count
            0x11, 0x00, 0x00, 0x00, // length
        ];
        expected.extend_from_slice(b"textures/hero.dds");
        expected.extend_from_slice(&[0x0F, 0x00, 0x00, 0x00]);
        expected.extend_from_slice(b"models/hero.mdl");
        assert_eq!(data, expected);
    }

    #[test]
    fn test_round_trip_cases() {
        test_round_trip(&sample());
        test_round_trip(&CrossReference::new());
    }

    #[test]
    fn test_add_usage_deduplicates() {
        let mut xref = CrossReference::new();
        let key = hash_path("textures/hero.dds");
        assert!(xref.add_usage(key, AssetKey::new(1)));
        assert!(xref.add_usage(key, AssetKey::new(2)));
        assert!(!xref.add_usage(key, AssetKey::new(1)));
        assert_eq!(xref.records.len(), 1);
        assert_eq!(xref.records[0].usages, vec![AssetKey::new(1), AssetKey::new(2)]);
    }

    #[test]
    fn test_string_key_is_raw_byte_hash() {
        let string = NameString::new(b"a\\b.dat".to_vec());
        assert_eq!(string.key(), AssetKey::new(0x749C_BCA5));
        assert_eq!(string.to_string_lossy(), "a\\b.dat");
    }

    #[test]
    fn test_parse_rejects_truncation_and_trailing_bytes() {
        let data = sample().build().unwrap();

        let err = CrossReference::parse(&data[..data.len() - 1]).unwrap_err();
        assert!(err.is_format_error());

        let mut padded = data;
        padded.push(0);
        let err = CrossReference::parse(&padded).unwrap_err();
        assert!(matches!(err, NameIndexError::FormatMismatch(_)));
    }

    #[test]
    fn test_empty_input_is_truncated() {
        assert!(CrossReference::parse(&[]).is_err());
    }
}
