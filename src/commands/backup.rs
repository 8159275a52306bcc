//! Backup pipeline — store → snapshot directory.
//!
//! # Stages (in order)
//!
//! | # | Stage       | Description                                        |
//! |---|-------------|----------------------------------------------------|
//! | 1 | List keys   | Fetch the whole keyspace, refuse unwritable keys   |
//! | 2 | Reset       | `rm -rf <root>` then `mkdir -p <root>`             |
//! | 3 | Write files | One file per key, parents created on demand       |
//!
//! Listing and key checks happen first, so an unreachable store or a key
//! that cannot become a file leaves the previous snapshot on disk untouched.  Once the reset stage has run there
//! is no going back: a failure while writing leaves a partial snapshot.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    snapshot::{self, Written},
    store::KvStore,
    ui::Pipeline,
};

/// What a backup wrote to disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Regular files, one per key.
    pub files: usize,
    /// Directories created for folder keys.
    pub folders: usize,
    /// Total value bytes written.
    pub bytes: usize,
}

/// Replace the snapshot at `root` with the current contents of `store`.
pub fn run<S: KvStore>(store: &S, root: &Path) -> Result<BackupReport> {
    let mut pipeline = Pipeline::new("Backup");

    // 1. List
    let pairs = pipeline.stage("List keys", |stage| {
        let pairs = store.list("").context("listing keys")?;
        for pair in &pairs {
            snapshot::check_pair(pair)?;
        }
        stage.set_label(format!("List keys ({})", pairs.len()));
        Ok(pairs)
    })?;

    // 2. Reset
    pipeline.stage(&format!("Reset {}", root.display()), |_| {
        snapshot::reset(root).context("resetting snapshot directory")
    })?;

    // 3. Write
    let report = pipeline.stage("Write files", |stage| {
        let total = pairs.len();
        let mut report = BackupReport::default();
        for (i, pair) in pairs.iter().enumerate() {
            stage.progress(i + 1, total);
            match snapshot::write_pair(root, pair)? {
                Written::File => {
                    report.files += 1;
                    report.bytes += pair.value.len();
                },
                Written::Folder => report.folders += 1,
            }
        }
        stage.set_label(format!("Write files ({}/{total})", report.files + report.folders));
        Ok(report)
    })?;

    pipeline.finish();
    info!(
        files = report.files,
        folders = report.folders,
        bytes = report.bytes,
        root = %root.display(),
        "backup finished"
    );
    Ok(report)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
