//! Pipeline handlers.
//!
//! Each file in this module corresponds to one user-facing mode:
//!
//! | File         | Invocation                | Description                      |
//! |--------------|---------------------------|----------------------------------|
//! | `backup.rs`  | `consul-backup -backup`   | Store → snapshot directory       |
//! | `restore.rs` | `consul-backup -restore`  | Snapshot directory → store       |
//!
//! Both are generic over [`crate::store::KvStore`] so tests can drive them
//! with an in-memory store and a temporary directory.

pub mod backup;
pub mod restore;
