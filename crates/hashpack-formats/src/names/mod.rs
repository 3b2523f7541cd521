//! Name recovery for hash-addressed assets
//!
//! Archives keep only keys, so names have to be recovered from precomputed
//! datasets:
//!
//! - **Key sets** ([`KeySet`]): flat lists of keys known to belong to some
//!   category of strings. They answer "is this key one of ours?".
//! - **Cross-reference** ([`CrossReference`]): which assets reference which,
//!   plus plaintext names that are re-hashed on load.
//!
//! [`NameIndex`] merges both into a read-only resolver. Every query checks
//! the key and its byte-swapped form, since keys copied out of tools or hex
//! dumps are frequently in the opposite byte order.
//!
//! ```rust,no_run
//! use hashpack_formats::names::{IndexSources, NameIndex};
//!
//! let sources = IndexSources::new()
//!     .with_key_set("fields.keys")
//!     .with_cross_reference("xref.bin");
//! let index = NameIndex::load(&sources)?;
//!
//! let result = index.lookup("0x1CE20B09")?;
//! if result.is_miss() {
//!     println!("unknown key, try a preimage search");
//! } else if result.swapped_only_hit() {
//!     println!("known in reversed byte order: {:?}", result.swapped.literal_name);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod index;
mod key_set;
mod xref;

pub use error::{NameIndexError, NameIndexResult};
pub use index::{IndexSources, LoadReport, LookupResult, NameIndex, ResolveResult, Usage};
pub use key_set::KeySet;
pub use xref::{CrossReference, NameString, UsageRecord};
