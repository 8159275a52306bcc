//! The on-disk side of a backup: a directory tree that mirrors the keyspace.
//!
//! Every regular file under the snapshot root is one key.  Its path relative
//! to the root, with components joined by `/`, is the key; its bytes are the
//! value.  Directories only provide structure.
//!
//! Keys are validated before they become paths so a key such as
//! `../../etc/passwd` can never write outside the root.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::store::KvPair;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{action} {}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("key '{key}' cannot be stored as a file: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("path {} is not valid UTF-8", .0.display())]
    NonUtf8(PathBuf),

    #[error("walking {}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> SnapshotError + 'a {
    move |source| SnapshotError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// What [`write_pair`] put on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Written {
    File,
    Folder,
}

// ─── Key ↔ path ───────────────────────────────────────────────────────────────

/// Relative path for `key`.
///
/// A single trailing `/` marks a folder key and is dropped.  Empty keys,
/// empty segments, `.`/`..` segments and NUL bytes are rejected, as are
/// backslashes on Windows where they would act as separators.
pub fn key_to_relative(key: &str) -> Result<PathBuf, SnapshotError> {
    let invalid = |reason| SnapshotError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    let trimmed = key.strip_suffix('/').unwrap_or(key);
    if trimmed.is_empty() {
        return Err(invalid("empty key"));
    }
    if trimmed.contains('\0') {
        return Err(invalid("contains a NUL byte"));
    }
    if cfg!(windows) && trimmed.contains('\\') {
        return Err(invalid("contains a backslash"));
    }

    let mut rel = PathBuf::new();
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(invalid("contains an empty path segment")),
            "." | ".." => return Err(invalid("contains a relative path segment")),
            s => rel.push(s),
        }
    }
    Ok(rel)
}

/// Key for the file at `path`, which must live under `root`.
pub fn path_to_key(root: &Path, path: &Path) -> Result<String, SnapshotError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| SnapshotError::InvalidKey {
            key: path.display().to_string(),
            reason: "file is outside the snapshot root",
        })?;

    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(os) => segments.push(
                os.to_str()
                    .ok_or_else(|| SnapshotError::NonUtf8(path.to_path_buf()))?,
            ),
            _ => {
                return Err(SnapshotError::InvalidKey {
                    key: rel.display().to_string(),
                    reason: "unexpected path component",
                });
            },
        }
    }
    Ok(segments.join("/"))
}

// ─── Writing ──────────────────────────────────────────────────────────────────

/// Delete `root` and everything below it, then recreate it empty.
///
/// A missing root is fine; anything else that stops the delete is an error.
pub fn reset(root: &Path) -> Result<(), SnapshotError> {
    match fs::remove_dir_all(root) {
        Ok(()) => debug!(root = %root.display(), "removed previous snapshot"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {},
        Err(e) => return Err(io_err("removing", root)(e)),
    }
    fs::create_dir_all(root).map_err(io_err("creating directory", root))
}

/// Relative path `pair` will be written to, or why it cannot be written.
///
/// A folder key holding a value has no file to live in and is refused.
pub fn check_pair(pair: &KvPair) -> Result<PathBuf, SnapshotError> {
    let rel = key_to_relative(&pair.key)?;
    if pair.is_folder() && !pair.value.is_empty() {
        return Err(SnapshotError::InvalidKey {
            key: pair.key.clone(),
            reason: "folder key carries a value",
        });
    }
    Ok(rel)
}

/// Materialise one pair under `root`.
///
/// Parent directories are created as needed.  Folder keys become an empty
/// directory.  Pairs refused by [`check_pair`] are refused here too.  A key
/// that collides with an existing directory (or whose parent is an existing
/// file) fails with an I/O error.
pub fn write_pair(root: &Path, pair: &KvPair) -> Result<Written, SnapshotError> {
    let path = root.join(check_pair(pair)?);

    if pair.is_folder() {
        fs::create_dir_all(&path).map_err(io_err("creating directory", &path))?;
        return Ok(Written::Folder);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err("creating directory", parent))?;
    }
    let mut file = File::create(&path).map_err(io_err("creating file", &path))?;
    file.write_all(&pair.value)
        .map_err(io_err("writing", &path))?;

    debug!(key = %pair.key, bytes = pair.value.len(), "wrote file");
    Ok(Written::File)
}

// ─── Reading ──────────────────────────────────────────────────────────────────

/// Walk `root` depth-first in file-name order, yielding one pair per file.
///
/// Directories (including symlinks that resolve to directories) are skipped.
/// The walk is lazy: each file is read only when its item is pulled, so a
/// caller that stops at the first error never reads the rest.  A missing
/// root yields a single error.
pub fn walk(root: &Path) -> impl Iterator<Item = Result<KvPair, SnapshotError>> + '_ {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| read_entry(root, entry).transpose())
}

fn read_entry(
    root: &Path,
    entry: walkdir::Result<walkdir::DirEntry>,
) -> Result<Option<KvPair>, SnapshotError> {
    let entry = entry.map_err(|source| SnapshotError::Walk {
        path: source
            .path()
            .map_or_else(|| root.to_path_buf(), Path::to_path_buf),
        source,
    })?;
    let path = entry.path();

    let meta = fs::metadata(path).map_err(io_err("reading metadata of", path))?;
    if meta.is_dir() {
        return Ok(None);
    }

    let key = path_to_key(root, path)?;
    let value = fs::read(path).map_err(io_err("reading", path))?;
    debug!(%key, bytes = value.len(), "read file");
    Ok(Some(KvPair { key, value }))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
