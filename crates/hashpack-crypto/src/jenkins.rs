//! Jenkins one-at-a-time hash used to address packed assets
//!
//! This is Bob Jenkins' `one_at_a_time` function: every input byte is folded
//! into a 32-bit accumulator with add/shift/xor steps, followed by three
//! finalization steps. It operates on raw bytes, so it is case-sensitive and
//! separator-sensitive: `a/b.dat`, `A/b.dat` and `a\b.dat` all produce
//! different keys. Callers that need cross-platform stable keys must normalize
//! separators before hashing.

use crate::key::AssetKey;

/// Compute the one-at-a-time hash of `data`
///
/// # Examples
///
/// ```
/// use hashpack_crypto::jenkins::one_at_a_time;
///
/// assert_eq!(one_at_a_time(b""), 0);
/// assert_eq!(one_at_a_time(b"a"), 0xca2e_9442);
/// ```
pub fn one_at_a_time(data: &[u8]) -> u32 {
    let mut h = 0u32;

    for &byte in data {
        h = h.wrapping_add(u32::from(byte));
        h = h.wrapping_add(h << 10);
        h ^= h >> 6;
    }

    h = h.wrapping_add(h << 3);
    h ^= h >> 11;
    h.wrapping_add(h << 15)
}

/// Hash raw bytes into an [`AssetKey`]
pub fn hash(data: &[u8]) -> AssetKey {
    AssetKey::new(one_at_a_time(data))
}

/// Hash a path string into an [`AssetKey`]
///
/// The string is hashed exactly as given; no separator or case folding is
/// applied.
pub fn hash_path(path: &str) -> AssetKey {
    hash(path.as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_one_at_a_time_reference_vectors() {
        let test_cases = vec![
            (b"" as &[u8], 0x0000_0000),
            (b"a", 0xca2e_9442),
            (b"The quick brown fox jumps over the lazy dog", 0x519e_91f5),
            (b"a/b.dat", 0xb6ef_970c),
            (b"textures/hero.dds", 0x1ce2_0b09),
            (b"data/ui/font.fnt", 0x19dc_6b99),
        ];

        for (data, expected) in test_cases {
            let result = one_at_a_time(data);
            assert_eq!(
                result,
                expected,
                "Hash mismatch for {:?}: got 0x{:08x}, expected 0x{:08x}",
                String::from_utf8_lossy(data),
                result,
                expected
            );
        }
    }

    #[test]
    fn test_case_and_separator_sensitive() {
        assert_eq!(hash_path("a/b.dat").get(), 0xb6ef_970c);
        assert_eq!(hash_path("A/b.dat").get(), 0xab74_7236);
        assert_eq!(hash_path("a\\b.dat").get(), 0x749c_bca5);
    }

    #[test]
    fn test_known_collision() {
        // Two distinct paths sharing one key
        assert_eq!(hash_path("col/dxst.dat"), hash_path("col/dxw0.dat"));
        assert_eq!(hash_path("col/dxst.dat").get(), 0xdb93_9c18);
    }

    #[test]
    fn test_concurrent_callers_agree() {
        let expected = hash_path("models/hero.mdl");
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| hash_path("models/hero.mdl")))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
        assert_eq!(expected.get(), 0x6b7d_2162);
    }

    proptest! {
        #[test]
        fn prop_hash_deterministic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(one_at_a_time(&data), one_at_a_time(&data));
            prop_assert_eq!(hash(&data).get(), one_at_a_time(&data));
        }
    }
}
