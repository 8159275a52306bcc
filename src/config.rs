//! Configuration types and loading logic.
//!
//! Settings come from three layers, later layers winning field by field:
//!
//! 1. `~/.config/consul-backup/config.toml` — global defaults
//! 2. `consul-backup.toml` in the working directory (or `--config <path>`)
//! 3. the process environment (`Consul_Address`, `CONSUL_HTTP_ADDR`, …)
//!
//! Every layer is optional.  With nothing configured the tool talks to a
//! local agent on `127.0.0.1:8500` and snapshots into `./data`.
//!
//! # File format
//!
//! ```toml
//! [consul]
//! address      = "consul.internal:8500"
//! token        = ""        # empty = anonymous
//! datacenter   = "dc1"
//! ssl          = false
//! timeout_secs = 30
//!
//! [snapshot]
//! dir = "data"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Address used when neither the environment nor a config file names one.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";

/// Snapshot root used when `[snapshot].dir` is not set.
pub const DEFAULT_SNAPSHOT_DIR: &str = "data";

// Checked in order; the first non-empty value wins.
const ADDRESS_VARS: [&str; 2] = ["Consul_Address", "CONSUL_HTTP_ADDR"];
const TOKEN_VARS: [&str; 2] = ["Consul_Token", "CONSUL_HTTP_TOKEN"];
const SSL_VAR: &str = "CONSUL_HTTP_SSL";
const DATACENTER_VAR: &str = "CONSUL_DATACENTER";

// ─── Resolved config ──────────────────────────────────────────────────────────

/// Fully resolved settings for one run.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub consul: ConsulConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// How to reach the Consul HTTP API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConsulConfig {
    /// `host:port`, optionally prefixed with `http://` or `https://`.
    pub address: String,

    /// ACL token sent as `X-Consul-Token`.  `None` means anonymous.
    #[serde(default)]
    pub token: Option<String>,

    /// Datacenter to query, sent as `?dc=`.  `None` lets the agent decide.
    #[serde(default)]
    pub datacenter: Option<String>,

    /// Use `https` when the address carries no scheme.
    #[serde(default)]
    pub ssl: bool,

    /// Per-request timeout.  `None` keeps the HTTP client's default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.into(),
            token: None,
            datacenter: None,
            ssl: false,
            timeout_secs: None,
        }
    }
}

/// Where the local snapshot lives.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
        }
    }
}

// ─── File layer ───────────────────────────────────────────────────────────────

/// One config file as written on disk.  Every field is optional so files can
/// be merged per field before defaults are filled in.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default)]
    pub consul: PartialConsul,
    #[serde(default)]
    pub snapshot: PartialSnapshot,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PartialConsul {
    pub address: Option<String>,
    pub token: Option<String>,
    pub datacenter: Option<String>,
    pub ssl: Option<bool>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PartialSnapshot {
    pub dir: Option<PathBuf>,
}

impl PartialConfig {
    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            consul: PartialConsul {
                address: other.consul.address.or(self.consul.address),
                token: other.consul.token.or(self.consul.token),
                datacenter: other.consul.datacenter.or(self.consul.datacenter),
                ssl: other.consul.ssl.or(self.consul.ssl),
                timeout_secs: other.consul.timeout_secs.or(self.consul.timeout_secs),
            },
            snapshot: PartialSnapshot {
                dir: other.snapshot.dir.or(self.snapshot.dir),
            },
        }
    }

    /// Apply environment overrides and fill the remaining gaps with defaults.
    ///
    /// `env` is the variable lookup; `main` passes `std::env::var`, tests pass
    /// a closure over a fixed table.  Empty variables count as unset.
    pub fn resolve(self, env: impl Fn(&str) -> Option<String>) -> Config {
        let lookup = |name: &str| env(name).filter(|v| !v.is_empty());
        let first = |names: &[&str]| names.iter().find_map(|&n| lookup(n));

        let file_address = self.consul.address.filter(|a| !a.is_empty());
        let file_token = self.consul.token.filter(|t| !t.is_empty());

        Config {
            consul: ConsulConfig {
                address: first(&ADDRESS_VARS)
                    .or(file_address)
                    .unwrap_or_else(|| DEFAULT_ADDRESS.into()),
                token: first(&TOKEN_VARS).or(file_token),
                datacenter: lookup(DATACENTER_VAR).or(self.consul.datacenter),
                ssl: lookup(SSL_VAR)
                    .and_then(|v| parse_bool(&v))
                    .or(self.consul.ssl)
                    .unwrap_or(false),
                timeout_secs: self.consul.timeout_secs,
            },
            snapshot: SnapshotConfig {
                dir: self
                    .snapshot
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            },
        }
    }
}

/// Boolean spellings accepted in `CONSUL_HTTP_SSL`.  Anything else is ignored.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Parse `path` into a [`PartialConfig`].
///
/// Returns `Ok(None)` when the file does not exist, and an error when it
/// exists but cannot be read or is not valid TOML.
pub fn parse_partial(path: &Path) -> Result<Option<PartialConfig>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, skipping");
        return Ok(None);
    }

    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    toml::from_str(&text)
        .map(Some)
        .with_context(|| format!("parsing {}", path.display()))
}

/// Load the global and local files, merge them, and resolve against `env`.
pub fn load_merged(
    global: Option<&Path>,
    local: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let global = match global {
        Some(p) => parse_partial(p)?.unwrap_or_default(),
        None => PartialConfig::default(),
    };
    let local = parse_partial(local)?.unwrap_or_default();

    Ok(global.merge(local).resolve(env))
}

/// `~/.config/consul-backup/config.toml` on this platform, if there is one.
pub fn global_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|d| d.join("consul-backup").join("config.toml"))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
