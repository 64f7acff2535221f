use serde::{Deserialize, Serialize};

/// A raw registry metadata document held by the metadata cache, per spec
/// §3/§4.1. `value` is the raw document (packument JSON, PyPI JSON,
/// repodata, POM XML, repomd, Packages stanza text, APKINDEX text, OCI
/// manifest JSON) — the cache never parses it, so it stores bytes plus a
/// content-type hint rather than a typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub fetched_at_ms: u64,
    pub ttl_ms: Option<u64>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: Vec<u8>, fetched_at_ms: u64, ttl_ms: Option<u64>) -> Self {
        Self {
            key: key.into(),
            value,
            fetched_at_ms,
            ttl_ms,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.ttl_ms {
            None => false,
            Some(ttl) => now_ms.saturating_sub(self.fetched_at_ms) > ttl,
        }
    }
}

/// Default TTLs per spec §4.1: 24h for listings, indefinite for exact
/// `(name, version)` metadata.
pub const LISTING_TTL_MS: u64 = 24 * 60 * 60 * 1000;
pub const EXACT_VERSION_TTL_MS: Option<u64> = None;
