//! Restore pipeline — snapshot directory → store.
//!
//! # Stages (in order)
//!
//! | # | Stage           | Description                                  |
//! |---|-----------------|----------------------------------------------|
//! | 1 | Delete all keys | Recursive delete from the keyspace root      |
//! | 2 | Put keys        | Walk the snapshot, one `put` per file        |
//!
//! The delete runs before the snapshot is even opened.  A restore that fails
//! in stage 2 leaves the store holding only the keys put so far.  The
//! snapshot itself is never modified.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::{snapshot, store::KvStore, ui::Pipeline};

/// What a restore put into the store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub keys: usize,
    pub bytes: usize,
}

/// Replace the contents of `store` with the snapshot at `root`.
pub fn run<S: KvStore>(store: &S, root: &Path) -> Result<RestoreReport> {
    let mut pipeline = Pipeline::new("Restore");

    // 1. Delete
    pipeline.stage("Delete all keys", |_| {
        store.delete_tree("").context("deleting keys")
    })?;

    // 2. Walk + put
    let report = pipeline.stage(&format!("Put keys from {}", root.display()), |stage| {
        let mut report = RestoreReport::default();
        for pair in snapshot::walk(root) {
            let pair = pair?;
            store
                .put(&pair)
                .with_context(|| format!("putting key '{}'", pair.key))?;
            report.keys += 1;
            report.bytes += pair.value.len();
            stage.set_label(format!("Put keys from {} ({})", root.display(), report.keys));
        }
        Ok(report)
    })?;

    pipeline.finish();
    info!(
        keys = report.keys,
        bytes = report.bytes,
        root = %root.display(),
        "restore finished"
    );
    Ok(report)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs};

    use super::*;
    use crate::{commands::backup, store::memory::MemoryStore};

    fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (key, value) in files {
            let path = root.join(key);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, value).unwrap();
        }
    }

    fn map_of(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn puts_one_key_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        write_tree(&root, &[("a/b", "1"), ("c", "2")]);

        let store = MemoryStore::default();
        let report = run(&store, &root).unwrap();

        assert_eq!(report, RestoreReport { keys: 2, bytes: 2 });
        assert_eq!(store.snapshot(), map_of(&[("a/b", "1"), ("c", "2")]));
    }

    #[test]
    fn keys_not_in_snapshot_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        write_tree(&root, &[("keep", "k")]);

        let store = MemoryStore::with_pairs(&[("keep", "old"), ("gone/one", "x"), ("gone/two", "y")]);
        run(&store, &root).unwrap();

        assert_eq!(store.snapshot(), map_of(&[("keep", "k")]));
    }

    #[test]
    fn empty_files_restore_as_empty_values() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        write_tree(&root, &[("empty", "")]);

        let store = MemoryStore::default();
        run(&store, &root).unwrap();
        assert_eq!(store.snapshot(), map_of(&[("empty", "")]));
    }

    #[test]
    fn empty_directories_produce_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        fs::create_dir_all(root.join("just").join("dirs")).unwrap();

        let store = MemoryStore::with_pairs(&[("old", "x")]);
        let report = run(&store, &root).unwrap();
        assert_eq!(report.keys, 0);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn snapshot_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        write_tree(&root, &[("a/b", "1"), ("c", "2")]);
        let before: Vec<_> = snapshot::walk(&root).collect::<Result<_, _>>().unwrap();

        run(&MemoryStore::default(), &root).unwrap();

        let after: Vec<_> = snapshot::walk(&root).collect::<Result<_, _>>().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn delete_failure_stops_before_reading_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        write_tree(&root, &[("new", "1")]);

        let store = MemoryStore {
            fail_delete: true,
            ..MemoryStore::with_pairs(&[("old", "x")])
        };
        let err = run(&store, &root).unwrap_err();

        assert!(format!("{err:#}").contains("Delete all keys failed"), "{err:#}");
        assert_eq!(store.snapshot(), map_of(&[("old", "x")]));
        assert_eq!(store.puts.get(), 0);
    }

    #[test]
    fn missing_snapshot_fails_after_store_was_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::with_pairs(&[("old", "x")]);

        let err = run(&store, &dir.path().join("missing")).unwrap_err();

        assert!(format!("{err:#}").contains("walking"), "{err:#}");
        assert!(store.keys().is_empty());
    }

    #[test]
    fn put_failure_aborts_remaining_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        write_tree(&root, &[("a", "1"), ("b", "2"), ("c", "3")]);

        let store = MemoryStore {
            fail_put_after: Some(1),
            ..MemoryStore::default()
        };
        let err = run(&store, &root).unwrap_err();

        assert!(format!("{err:#}").contains("putting key 'b'"), "{err:#}");
        assert_eq!(store.keys(), vec!["a"]);
        // The walk stops at the failing key; "c" is never attempted.
        assert_eq!(store.puts.get(), 2);
    }

    #[test]
    fn backup_then_restore_round_trips() {
        let mut cases: Vec<Vec<(&str, &str)>> = vec![
            vec![("a/b", "1"), ("c", "2")],
            vec![],
            vec![("deep/er/and/deeper/key", "value"), ("deep/sibling", "")],
            vec![("unicode/ключ", "значение"), ("spaces in/key name", "v a l")],
        ];
        if cfg!(unix) {
            cases.push(vec![("win\\path", "v"), ("dir/back\\slash", "w")]);
        }

        for pairs in cases {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("data");
            let source = MemoryStore::with_pairs(&pairs);

            backup::run(&source, &root).unwrap();
            let target = MemoryStore::with_pairs(&[("stray", "z")]);
            run(&target, &root).unwrap();

            assert_eq!(target.snapshot(), source.snapshot(), "case {pairs:?}");
        }
    }
}
