#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for writing name datasets and resolving keys from them

use hashpack_crypto::{AssetKey, hash_path};
use hashpack_formats::names::{CrossReference, IndexSources, KeySet, NameIndex};
use pretty_assertions::assert_eq;

fn write_datasets(dir: &std::path::Path) -> IndexSources {
    let shaders = dir.join("shaders.keys");
    KeySet::from_names(["shaders/lit.fx", "shaders/unlit.fx"])
        .write_to_path(&shaders)
        .unwrap();

    let textures = dir.join("textures.keys");
    KeySet::from_names(["textures/hero.dds"])
        .write_to_path(&textures)
        .unwrap();

    let mut xref = CrossReference::new();
    let texture = xref.add_string("textures/hero.dds");
    let model = xref.add_string("models/hero.mdl");
    let shader = xref.add_string("shaders/lit.fx");
    xref.add_usage(texture, model);
    xref.add_usage(shader, model);
    xref.add_usage(shader, hash_path("models/villain.mdl"));
    let xref_path = dir.join("xref.bin");
    xref.write_to_path(&xref_path).unwrap();

    IndexSources::new()
        .with_key_set(shaders)
        .with_key_set(textures)
        .with_cross_reference(xref_path)
}

#[test]
fn name_index_resolves_across_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let index = NameIndex::load(&write_datasets(dir.path())).unwrap();

    let result = index.resolve(hash_path("shaders/lit.fx"));
    assert_eq!(result.found_in_sets, vec!["shaders.keys"]);
    assert_eq!(result.literal_name.as_deref(), Some("shaders/lit.fx"));
    let usage_names: Vec<_> = result.usages.iter().map(|u| u.name.clone()).collect();
    assert_eq!(usage_names, vec![Some("models/hero.mdl".to_string()), None]);

    let report = index.report();
    assert_eq!(report.key_sets, 2);
    assert_eq!(report.set_keys, 3);
    assert_eq!(report.strings, 3);
    assert_eq!(report.usage_records, 2);
}

#[test]
fn name_index_lookup_checks_both_byte_orders() {
    let dir = tempfile::tempdir().unwrap();
    let index = NameIndex::load(&write_datasets(dir.path())).unwrap();

    let key = hash_path("textures/hero.dds");
    let forward = index.lookup(&key.to_hex()).unwrap();
    assert_eq!(forward.forward.found_in_sets, vec!["textures.keys"]);
    assert!(!forward.swapped_only_hit());

    let reversed = index.lookup(&format!("0x{}", key.swap_bytes().to_hex())).unwrap();
    assert!(reversed.swapped_only_hit());
    assert_eq!(
        reversed.swapped.literal_name.as_deref(),
        Some("textures/hero.dds")
    );
}

#[test]
fn name_index_miss_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let index = NameIndex::load(&write_datasets(dir.path())).unwrap();

    let result = index.lookup_key(AssetKey::new(0x0102_0304));
    assert!(result.is_miss());
    assert!(result.forward.is_empty());
}

#[test]
fn name_index_missing_dataset_aborts_load() {
    let dir = tempfile::tempdir().unwrap();
    let sources = IndexSources::new().with_cross_reference(dir.path().join("absent.bin"));
    assert!(NameIndex::load(&sources).is_err());
}
