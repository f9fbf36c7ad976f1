//! End-to-end tests for the Symdex loader session.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use symdex_core::{CoreError, Loader, LoaderConfig};
use symdex_indexer::{IndexerError, RETRY_LIMIT};

fn setup(base: &Path) -> (PathBuf, PathBuf) {
    let base = fs::canonicalize(base).unwrap();
    let root = base.join("root");
    fs::create_dir_all(root.join("a")).unwrap();
    fs::write(root.join("a/Foo.src"), "<?php class Foo {}").unwrap();
    (root, base.join("cache"))
}

fn config(root: &Path, cache: &Path) -> LoaderConfig {
    let mut config = LoaderConfig::default()
        .add_directory([root])
        .set_cache_dir(cache)
        .unwrap();
    config.accept_files = vec!["*.src".to_string()];
    config
}

#[test]
fn test_resolve_then_missing_file() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    let mut loader = Loader::new(config(&root, &cache));

    assert_eq!(loader.resolve("Foo").unwrap(), Some(root.join("a/Foo.src")));

    fs::remove_file(root.join("a/Foo.src")).unwrap();
    assert_eq!(loader.resolve("Foo").unwrap(), None);
    loader.flush().unwrap();

    let snapshot: serde_json::Value =
        serde_json::from_slice(&fs::read(loader.cache_path().unwrap()).unwrap()).unwrap();
    assert_eq!(snapshot["missing"]["Foo"], 1);
}

#[test]
fn test_unchanged_refreshes_persist_identical_bytes() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    fs::write(root.join("empty.src"), "<?php // nothing here").unwrap();

    let mut first = Loader::new(config(&root, &cache));
    first.refresh().unwrap();
    let path = first.cache_path().unwrap();
    drop(first);
    let before = fs::read(&path).unwrap();

    let mut second = Loader::new(config(&root, &cache));
    assert!(second.refresh().unwrap());
    drop(second);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_modified_file_is_picked_up_without_rebuild() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    let mut loader = Loader::new(config(&root, &cache));
    loader.resolve("Foo").unwrap();

    let file = root.join("a/Foo.src");
    fs::write(&file, "<?php namespace N; class Foo {} class Baz {}").unwrap();
    File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(30))
        .unwrap();

    assert_eq!(loader.resolve("N\\Foo").unwrap(), None);
    // The stale entry for "Foo" triggers the rescan.
    assert_eq!(loader.resolve("Foo").unwrap(), None);
    assert_eq!(loader.resolve("N\\Baz").unwrap(), Some(file));
    assert_eq!(loader.stats().walks, 1);
}

#[test]
fn test_exhausted_symbol_stops_scanning() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    let mut loader = Loader::new(config(&root, &cache));

    for _ in 0..RETRY_LIMIT {
        assert_eq!(loader.resolve("Ghost").unwrap(), None);
    }
    drop(loader);

    // A fresh session loads the exhausted counter and never walks.
    fs::write(root.join("Ghost.src"), "<?php class Ghost {}").unwrap();
    let mut loader = Loader::new(config(&root, &cache));
    assert_eq!(loader.resolve("Ghost").unwrap(), None);
    assert_eq!(loader.stats().walks, 0);
    assert_eq!(loader.stats().scanned_files, 0);

    // An explicit rebuild starts over.
    loader.rebuild().unwrap();
    assert_eq!(loader.resolve("Ghost").unwrap(), Some(root.join("Ghost.src")));
}

#[test]
fn test_ambiguous_symbol_surfaces() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    fs::write(root.join("Other.src"), "<?php class Foo {}").unwrap();
    let mut loader = Loader::new(config(&root, &cache));

    let err = loader.resolve("Foo").unwrap_err();
    assert!(matches!(
        err,
        CoreError::Indexer(IndexerError::AmbiguousSymbol { .. })
    ));
    assert!(!loader.cache_path().unwrap().exists());
}

#[test]
fn test_excluded_directory_is_not_indexed() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    fs::create_dir_all(root.join("legacy")).unwrap();
    fs::write(root.join("legacy/Old.src"), "<?php class Old {}").unwrap();

    let mut loader = Loader::new(config(&root, &cache).exclude_directory([root.join("legacy")]));
    let symbols = loader.indexed_symbols().unwrap();
    assert!(symbols.contains_key("Foo"));
    assert!(!symbols.contains_key("Old"));
}

#[test]
fn test_configurations_use_separate_caches() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());

    let a = Loader::new(config(&root, &cache));
    let b = Loader::new(config(&root, &cache).exclude_directory([root.join("a")]));
    assert_ne!(a.cache_path(), b.cache_path());
}

#[test]
fn test_conflict_on_warm_cache_leaves_index_intact() {
    let temp_dir = tempdir().unwrap();
    let (root, cache) = setup(temp_dir.path());
    fs::create_dir_all(root.join("z")).unwrap();
    fs::write(root.join("z/Zed.src"), "<?php class Zed {}").unwrap();
    let path = {
        let mut warm = Loader::new(config(&root, &cache));
        assert_eq!(warm.indexed_symbols().unwrap().len(), 2);
        warm.cache_path().unwrap()
    };
    let before = fs::read(&path).unwrap();

    // Walked ahead of z/, so the refresh fails before reaching Zed.
    fs::write(root.join("a/Dup.src"), "<?php class Foo {}").unwrap();
    let mut loader = Loader::new(config(&root, &cache));
    assert!(matches!(
        loader.resolve("Nope").unwrap_err(),
        CoreError::Indexer(IndexerError::AmbiguousSymbol { .. })
    ));

    assert_eq!(loader.resolve("Zed").unwrap(), Some(root.join("z/Zed.src")));
    let symbols = loader.indexed_symbols().unwrap();
    assert!(symbols.contains_key("Foo"));
    assert!(symbols.contains_key("Zed"));
    drop(loader);

    assert_eq!(fs::read(&path).unwrap(), before);
}
