//! Blocking Consul KV client.
//!
//! Only the three KV endpoints the pipelines need are wrapped:
//!
//! | Operation        | Request                          |
//! |------------------|----------------------------------|
//! | list everything  | `GET    /v1/kv/<prefix>?recurse` |
//! | delete a subtree | `DELETE /v1/kv/<prefix>?recurse` |
//! | put one pair     | `PUT    /v1/kv/<key>`            |
//!
//! Consul returns values base64-encoded inside the list response; they are
//! decoded here so the rest of the crate only ever sees raw bytes.

use std::time::Duration;

use base64::Engine;
use reqwest::{
    StatusCode, Url,
    blocking::{Client, RequestBuilder, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::ConsulConfig,
    store::{KvPair, KvStore, StoreError},
};

const TOKEN_HEADER: &str = "X-Consul-Token";

// ─── Client ───────────────────────────────────────────────────────────────────

/// Handle on one Consul agent.  Cheap to construct; no request is made until
/// the first store call.
#[derive(Debug)]
pub struct ConsulClient {
    http: Client,
    base: Url,
    token: Option<String>,
    datacenter: Option<String>,
}

impl ConsulClient {
    /// Build a client for the agent described by `cfg`.
    ///
    /// Fails when the address cannot be turned into an `http(s)` URL or the
    /// HTTP client cannot be initialised.  Reachability is not checked.
    pub fn connect(cfg: &ConsulConfig) -> Result<Self, StoreError> {
        let base = base_url(&cfg.address, cfg.ssl)?;

        let mut builder = Client::builder();
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(StoreError::Client)?;

        info!(address = %base, datacenter = ?cfg.datacenter, "consul client ready");

        Ok(Self {
            http,
            base,
            token: cfg.token.clone(),
            datacenter: cfg.datacenter.clone(),
        })
    }

    fn url(&self, key: &str, recurse: bool) -> Result<Url, StoreError> {
        kv_url(&self.base, key, recurse, self.datacenter.as_deref())
    }

    fn send(&self, op: &'static str, req: RequestBuilder) -> Result<Response, StoreError> {
        let req = match self.token.as_deref() {
            Some(t) => req.header(TOKEN_HEADER, t),
            None => req,
        };
        req.send()
            .map_err(|source| StoreError::Transport { op, source })
    }
}

impl KvStore for ConsulClient {
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>, StoreError> {
        let url = self.url(prefix, true)?;
        debug!(%url, "listing keys");

        let resp = self.send("list", self.http.get(url))?;
        // Consul answers 404 when nothing lives under the prefix.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let resp = check("list", resp)?;
        let body = resp
            .bytes()
            .map_err(|source| StoreError::Transport { op: "list", source })?;

        let pairs = decode_entries(&body)?;
        info!(count = pairs.len(), "listed keys");
        Ok(pairs)
    }

    fn delete_tree(&self, prefix: &str) -> Result<(), StoreError> {
        let url = self.url(prefix, true)?;
        debug!(%url, "deleting tree");

        check("delete", self.send("delete", self.http.delete(url))?)?;
        Ok(())
    }

    fn put(&self, pair: &KvPair) -> Result<(), StoreError> {
        let url = self.url(&pair.key, false)?;
        debug!(key = %pair.key, bytes = pair.value.len(), "put");

        let resp = check(
            "put",
            self.send("put", self.http.put(url).body(pair.value.clone()))?,
        )?;
        let body = resp
            .text()
            .map_err(|source| StoreError::Transport { op: "put", source })?;

        if body.trim() == "true" {
            Ok(())
        } else {
            Err(StoreError::Rejected(pair.key.clone()))
        }
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Turn a configured address into the agent's base URL.
///
/// `host:port` gets `http://` (or `https://` when `ssl` is set); an explicit
/// `http://` / `https://` prefix is kept as-is.  Other schemes are rejected.
pub fn base_url(address: &str, ssl: bool) -> Result<Url, StoreError> {
    let invalid = |reason: String| StoreError::Address {
        address: address.to_string(),
        reason,
    };

    let raw = if address.contains("://") {
        address.to_string()
    } else {
        let scheme = if ssl { "https" } else { "http" };
        format!("{scheme}://{address}")
    };

    let url = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// `<base>/v1/kv/<key>` with each key segment percent-encoded.
pub fn kv_url(
    base: &Url,
    key: &str,
    recurse: bool,
    datacenter: Option<&str>,
) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| StoreError::Address {
            address: base.to_string(),
            reason: "address cannot carry a path".into(),
        })?
        .pop_if_empty()
        .extend(["v1", "kv"])
        .extend(key.trim_start_matches('/').split('/'));

    if recurse || datacenter.is_some() {
        let mut query = url.query_pairs_mut();
        if recurse {
            query.append_pair("recurse", "true");
        }
        if let Some(dc) = datacenter {
            query.append_pair("dc", dc);
        }
    }
    Ok(url)
}

fn check(op: &'static str, resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(StoreError::Status {
        op,
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

/// One element of Consul's list response.  Fields we do not use are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Entry {
    key: String,
    #[serde(default)]
    value: Option<String>,
}

/// Decode the JSON body of a recursive list into pairs, preserving order.
///
/// `null` values (folder keys, empty puts) become empty byte vectors.
pub fn decode_entries(body: &[u8]) -> Result<Vec<KvPair>, StoreError> {
    let entries: Vec<Entry> = serde_json::from_slice(body).map_err(|e| StoreError::Decode {
        op: "list",
        reason: e.to_string(),
    })?;

    entries
        .into_iter()
        .map(|e| {
            let value = match e.value {
                Some(b64) => base64::engine::general_purpose::STANDARD
                    .decode(b64.as_bytes())
                    .map_err(|err| StoreError::Decode {
                        op: "list",
                        reason: format!("value of '{}' is not base64: {err}", e.key),
                    })?,
                None => Vec::new(),
            };
            Ok(KvPair::new(e.key, value))
        })
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
