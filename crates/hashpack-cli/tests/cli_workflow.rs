#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end tests driving the `hashpack` binary

use hashpack_crypto::hash_path;
use hashpack_formats::names::{CrossReference, KeySet};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::process::{Command, Output};

fn hashpack(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hashpack"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("HASHPACK_ALIGNMENT")
        .env_remove("HASHPACK_UNKNOWN_DIR")
        .env_remove("HASHPACK_WORKERS")
        .env_remove("HASHPACK_KEY_SETS")
        .env_remove("HASHPACK_XREF")
        .output()
        .expect("binary should start")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn cli_hash_prints_keys() {
    let output = hashpack(&["hash", "textures/hero.dds"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "1CE20B09  textures/hero.dds  (swapped 090BE21C)\n"
    );
}

#[test]
fn cli_build_lookup_extract() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("assets");
    std::fs::create_dir_all(source.join("models")).unwrap();
    std::fs::write(source.join("models/hero.mdl"), b"model").unwrap();
    std::fs::create_dir_all(source.join("unknown")).unwrap();
    std::fs::write(source.join("unknown/0BADF00D.bin"), b"mystery").unwrap();

    let table = dir.path().join("assets.tbl");
    let blob = dir.path().join("assets.blob");
    let output = hashpack(&[
        "--json",
        "build",
        path(&source),
        path(&table),
        path(&blob),
        "--alignment",
        "32",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["command"], "build");
    assert_eq!(json["report"]["written"], 2);
    assert_eq!(json["report"]["blob_size"], 64);

    // Refuses to overwrite without --force
    let output = hashpack(&["build", path(&source), path(&table), path(&blob)]);
    assert!(!output.status.success());

    let keys = dir.path().join("models.keys");
    KeySet::from_names(["models/hero.mdl"]).write_to_path(&keys).unwrap();
    let xref = dir.path().join("xref.bin");
    let mut dataset = CrossReference::new();
    dataset.add_string("models/hero.mdl");
    dataset.write_to_path(&xref).unwrap();

    let key = hash_path("models/hero.mdl").to_hex();
    let output = hashpack(&["lookup", &key, "--key-set", path(&keys), "--xref", path(&xref)]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("name: models/hero.mdl"));

    let out = dir.path().join("unpacked");
    let output = hashpack(&[
        "extract",
        path(&table),
        path(&blob),
        path(&out),
        "--xref",
        path(&xref),
    ]);
    assert!(output.status.success());
    assert_eq!(std::fs::read(out.join("models/hero.mdl")).unwrap(), b"model");
    assert_eq!(
        std::fs::read(out.join("unknown/0BADF00D.bin")).unwrap(),
        b"mystery"
    );
}

#[test]
fn cli_lookup_miss_exits_with_failure() {
    let output = hashpack(&["lookup", "0x12345678"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Key 12345678: no match"));
}

#[test]
fn cli_rejects_bad_alignment() {
    let dir = tempfile::tempdir().unwrap();
    let output = hashpack(&[
        "build",
        path(dir.path()),
        path(&dir.path().join("t")),
        path(&dir.path().join("b")),
        "--alignment",
        "3",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid alignment"));
}
