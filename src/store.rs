//! The key-value store seen by the pipelines.
//!
//! Backup and restore only ever need three things from the store: list every
//! pair, delete everything under a prefix, and put one pair.  [`KvStore`]
//! captures exactly that so the pipelines can run against Consul in
//! production and against an in-memory map in tests.
//!
//! Connecting is not part of the trait: a concrete client is built from its
//! own configuration (see [`crate::consul::ConsulClient::connect`]) and then
//! handed to the pipelines by reference.

use thiserror::Error;

// ─── Data ─────────────────────────────────────────────────────────────────────

/// One entry of the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Slash-separated key, unique within the store.
    pub key: String,
    /// Raw value bytes.  Never re-encoded.
    pub value: Vec<u8>,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Consul "folder" keys end in `/` and exist only to give the UI a tree.
    pub fn is_folder(&self) -> bool {
        self.key.ends_with('/')
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("{op} request failed")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op} returned HTTP {status}: {body}")]
    Status {
        op: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not decode {op} response: {reason}")]
    Decode { op: &'static str, reason: String },

    #[error("store refused to write key '{0}'")]
    Rejected(String),
}

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Minimal store surface used by the backup and restore pipelines.
pub trait KvStore {
    /// Every pair whose key starts with `prefix`, in store order.
    ///
    /// An empty prefix lists the whole keyspace.  An empty keyspace is an
    /// empty `Vec`, not an error.
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>, StoreError>;

    /// Delete every key that starts with `prefix`.
    fn delete_tree(&self, prefix: &str) -> Result<(), StoreError>;

    /// Create or overwrite a single pair.
    fn put(&self, pair: &KvPair) -> Result<(), StoreError>;
}

// ─── In-memory store (tests) ──────────────────────────────────────────────────


// ─── Tests ────────────────────────────────────────────────────────────────────
