// src/cache/mod.rs
//! List cache keyed by `"{source}:{keyword}"` with a fixed TTL per insert.

pub mod memory;
pub mod redis;

use anyhow::Result;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackend, CacheConfig};
use crate::ingest::types::Item;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// Key/value list store. `put` replaces the whole list in one step.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Stored list for `key`, or empty when absent or expired.
    async fn get(&self, key: &str) -> Result<Vec<String>>;
    /// Replace the list for `key` and expire it after `ttl`. An empty list deletes the key.
    async fn put(&self, key: &str, items: &[String], ttl: Duration) -> Result<()>;
    async fn ping(&self) -> Result<()>;
    fn backend(&self) -> &'static str;
}

pub type DynCache = Arc<dyn CacheStore>;

/// Open the configured backend. A Redis store that does not answer PING is an error.
pub async fn connect(cfg: &CacheConfig) -> Result<DynCache> {
    match cfg.backend {
        CacheBackend::Redis => {
            let store = RedisCache::connect(&cfg.redis.connection_url()).await?;
            Ok(Arc::new(store))
        }
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
    }
}

/// Serialize one item into its stored string form (fixed-schema JSON).
pub fn encode_item(item: &Item) -> Result<String> {
    Ok(serde_json::to_string(item)?)
}

pub fn encode_items(items: &[Item]) -> Result<Vec<String>> {
    items.iter().map(encode_item).collect()
}

/// Parse stored strings back into items, keeping order.
///
/// Entries that do not match the schema are skipped and counted; they are
/// never interpreted in any other way.
pub fn decode_items(raw: &[String]) -> Vec<Item> {
    let mut out = Vec::with_capacity(raw.len());
    for (idx, entry) in raw.iter().enumerate() {
        match serde_json::from_str::<Item>(entry) {
            Ok(item) => out.push(item),
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "skipping malformed cache entry");
                counter!("cache_decode_skipped_total").increment(1);
            }
        }
    }
    out
}
