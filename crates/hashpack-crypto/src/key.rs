//! 32-bit asset keys

use crate::error::KeyParseError;
use binrw::{BinRead, BinWrite};
use std::fmt;

/// Key addressing a single asset inside an archive
///
/// Produced by [`hash`](crate::hash) from a path, or taken verbatim from a
/// hex literal for assets whose path is unknown.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[brw(little)] // Keys are little-endian in every on-disk structure
pub struct AssetKey(u32);

impl AssetKey {
    /// Number of hex digits in a literal key
    pub const HEX_DIGITS: usize = 8;

    /// Create a key from its raw value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Hash a path into a key
    pub fn from_path(path: &str) -> Self {
        crate::jenkins::hash_path(path)
    }

    /// Hash raw bytes into a key
    pub fn from_bytes(data: &[u8]) -> Self {
        crate::jenkins::hash(data)
    }

    /// Reverse the byte order of the key
    #[must_use]
    pub const fn swap_bytes(self) -> Self {
        Self(self.0.swap_bytes())
    }

    /// Parse a key written as exactly eight hex digits, as produced by
    /// `Display`
    ///
    /// Digits are case-insensitive; no prefix is accepted.
    pub fn from_hex(hex: &str) -> Result<Self, KeyParseError> {
        if hex.len() != Self::HEX_DIGITS {
            return Err(KeyParseError::InvalidLength {
                expected: Self::HEX_DIGITS,
                actual: hex.len(),
            });
        }

        let mut bytes = [0u8; 4];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|_| KeyParseError::NotHex(hex.to_string()))?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }

    /// Parse a literal key written as one to eight hex digits
    ///
    /// This is the form used for file names in the unknown namespace
    /// (`DEADBEEF.bin`, `1234.bin`). No prefix or whitespace is accepted.
    pub fn from_literal(digits: &str) -> Result<Self, KeyParseError> {
        Self::parse_digits(digits, digits)
    }

    /// Parse a user-supplied key query
    ///
    /// Accepts an optional `0x`/`0X` prefix followed by one to eight hex
    /// digits, so `0x1f`, `1F` and `0000001f` all name the same key.
    pub fn parse_query(input: &str) -> Result<Self, KeyParseError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        Self::parse_digits(digits, input)
    }

    fn parse_digits(digits: &str, input: &str) -> Result<Self, KeyParseError> {
        if digits.is_empty() || digits.len() > Self::HEX_DIGITS {
            return Err(KeyParseError::InvalidLength {
                expected: Self::HEX_DIGITS,
                actual: digits.len(),
            });
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(KeyParseError::NotHex(input.to_string()));
        }

        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| KeyParseError::NotHex(input.to_string()))
    }

    /// Format as eight uppercase hex digits
    pub fn to_hex(self) -> String {
        format!("{:08X}", self.0)
    }

    /// Little-endian byte representation, as stored on disk
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

/// Reverse the byte order of a key
pub const fn byte_swap(key: AssetKey) -> AssetKey {
    key.swap_bytes()
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::LowerHex for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

/// Serialized as its eight-digit hex form so reports stay readable
#[cfg(feature = "serde")]
impl serde::Serialize for AssetKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<u32> for AssetKey {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<AssetKey> for u32 {
    fn from(key: AssetKey) -> Self {
        key.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(AssetKey::from_hex("DEADBEEF"), Ok(AssetKey::new(0xDEAD_BEEF)));
        assert_eq!(AssetKey::from_hex("deadbeef"), Ok(AssetKey::new(0xDEAD_BEEF)));
        assert_eq!(AssetKey::from_hex("00000001"), Ok(AssetKey::new(1)));
    }

    #[test]
    fn test_from_hex_rejects_malformed() {
        assert_eq!(
            AssetKey::from_hex("BEEF"),
            Err(KeyParseError::InvalidLength {
                expected: 8,
                actual: 4
            })
        );
        assert!(matches!(
            AssetKey::from_hex("NOTAHASH"),
            Err(KeyParseError::NotHex(_))
        ));
        assert!(AssetKey::from_hex("0xDEADBE").is_err());
    }

    #[test]
    fn test_parse_query() {
        let expected = AssetKey::new(0x1F);
        assert_eq!(AssetKey::parse_query("0x1f"), Ok(expected));
        assert_eq!(AssetKey::parse_query("1F"), Ok(expected));
        assert_eq!(AssetKey::parse_query(" 0000001f "), Ok(expected));
        assert!(AssetKey::parse_query("").is_err());
        assert!(AssetKey::parse_query("0x").is_err());
        assert!(AssetKey::parse_query("123456789").is_err());
        assert!(AssetKey::parse_query("+1f").is_err());
        assert!(AssetKey::parse_query("a/b.dat").is_err());
    }

    #[test]
    fn test_from_literal() {
        assert_eq!(AssetKey::from_literal("ABCD"), Ok(AssetKey::new(0xABCD)));
        assert_eq!(AssetKey::from_literal("1234"), Ok(AssetKey::new(0x1234)));
        assert_eq!(AssetKey::from_literal("deadbeef"), Ok(AssetKey::new(0xDEAD_BEEF)));
        assert!(AssetKey::from_literal("").is_err());
        assert!(AssetKey::from_literal("0x1f").is_err());
        assert!(AssetKey::from_literal(" 1f").is_err());
        assert!(AssetKey::from_literal("123456789").is_err());
        assert!(AssetKey::from_literal("0000ABCD.skn").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(AssetKey::new(0xDEAD_BEEF).to_string(), "DEADBEEF");
        assert_eq!(AssetKey::new(0x1F).to_string(), "0000001F");
        assert_eq!(format!("{:08x}", AssetKey::new(0x1F)), "0000001f");
        assert_eq!(AssetKey::new(0xAB).to_hex(), "000000AB");
    }

    #[test]
    fn test_swap_bytes() {
        let key = AssetKey::new(0x1122_3344);
        assert_eq!(key.swap_bytes(), AssetKey::new(0x4433_2211));
        assert_eq!(byte_swap(key), key.swap_bytes());
    }

    #[test]
    fn test_binary_layout_is_little_endian() {
        use binrw::io::Cursor;

        let mut cursor = Cursor::new(Vec::new());
        AssetKey::new(0x1122_3344).write(&mut cursor).unwrap();
        assert_eq!(cursor.get_ref(), &[0x44, 0x33, 0x22, 0x11]);

        cursor.set_position(0);
        assert_eq!(AssetKey::read(&mut cursor).unwrap(), AssetKey::new(0x1122_3344));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serializes_as_hex() {
        let json = serde_json::to_string(&AssetKey::new(0xDEAD_BEEF)).unwrap();
        assert_eq!(json, "\"DEADBEEF\"");
    }

    #[test]
    fn test_hex_round_trip_through_display() {
        let key = AssetKey::from_path("textures/hero.dds");
        assert_eq!(AssetKey::from_hex(&key.to_string()), Ok(key));
    }

    proptest! {
        #[test]
        fn prop_byte_swap_involution(value in any::<u32>()) {
            let key = AssetKey::new(value);
            prop_assert_eq!(byte_swap(byte_swap(key)), key);
        }

        #[test]
        fn prop_parse_query_accepts_display(value in any::<u32>()) {
            let key = AssetKey::new(value);
            prop_assert_eq!(AssetKey::parse_query(&key.to_string()), Ok(key));
            prop_assert_eq!(AssetKey::parse_query(&format!("0x{value:x}")), Ok(key));
        }
    }
}
