//! Test utilities for format round-trip testing and scratch source trees

use crate::BinaryFormat;
use std::fmt::Debug;
use std::path::Path;

/// Build a value, parse it back and require equality
pub fn test_round_trip<T>(original: &T)
where
    T: BinaryFormat + PartialEq + Debug,
    T::Error: Debug,
{
    let data = original.build().expect("build should succeed");
    let parsed = T::parse(&data).expect("parse should succeed");
    assert_eq!(original, &parsed, "round-trip changed the value");
    assert!(T::round_trips(&data).expect("round trip should succeed"));
}

/// Write `files` (relative path, contents) below `root`, creating directories
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directories");
        }
        std::fs::write(&path, contents).expect("write fixture file");
    }
}
