//! Path hashing primitives for hash-addressed asset archives
//!
//! Every packaged asset is addressed by a 32-bit key derived from its original
//! path. The path string itself is discarded at pack time, so the tooling needs
//! three things from this crate:
//!
//! - **Hashing**: Bob Jenkins' one-at-a-time hash over the raw path bytes
//! - **Keys**: the [`AssetKey`] newtype with hex parsing and byte-swapping
//! - **Preimage search**: a parallel randomized search for a string hashing to
//!   a given key, used when no name index knows the path
//!
//! # Examples
//!
//! ## Hashing a path
//!
//! ```
//! use hashpack_crypto::{AssetKey, hash_path};
//!
//! let key = hash_path("a/b.dat");
//! assert_eq!(key, AssetKey::new(0xB6EF_970C));
//! println!("key: {key}");
//! ```
//!
//! ## Probing the opposite byte order
//!
//! ```
//! use hashpack_crypto::AssetKey;
//!
//! let key = AssetKey::new(0xDEAD_BEEF);
//! assert_eq!(key.swap_bytes(), AssetKey::new(0xEFBE_ADDE));
//! assert_eq!(key.swap_bytes().swap_bytes(), key);
//! ```
//!
//! ## Recovering a preimage
//!
//! ```
//! use hashpack_crypto::{CancelToken, PreimageSearch, hash_path};
//!
//! let target = hash_path("ab.bin");
//! let found = PreimageSearch::new(target)
//!     .with_suffix("bin")
//!     .with_alphabet(b"ab")
//!     .with_body_len(2)
//!     .with_workers(2)
//!     .run(&CancelToken::new())
//!     .expect("tiny search space");
//! assert_eq!(hash_path(&found), target);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod jenkins;
pub mod key;
pub mod preimage;

pub use error::{KeyParseError, SearchError};

// Re-export commonly used types
pub use jenkins::{hash, hash_path, one_at_a_time};
pub use key::{AssetKey, byte_swap};
pub use preimage::{CancelToken, PreimageSearch, SearchProgress, search};
