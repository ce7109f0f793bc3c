// src/cache/memory.rs
//! In-process cache with the same contract as the Redis store.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::CacheStore;

#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    items: Vec<String>,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys (expired ones are dropped first).
    pub fn len(&self) -> usize {
        let mut map = self.inner.lock().expect("memory cache mutex poisoned");
        let now = Instant::now();
        map.retain(|_, e| e.expires_at > now);
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Vec<String>> {
        let mut map = self.inner.lock().expect("memory cache mutex poisoned");
        let expired = match map.get(key) {
            Some(e) if e.expires_at > Instant::now() => return Ok(e.items.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            map.remove(key);
        }
        Ok(Vec::new())
    }

    async fn put(&self, key: &str, items: &[String], ttl: Duration) -> Result<()> {
        let mut map = self.inner.lock().expect("memory cache mutex poisoned");
        map.remove(key);
        if !items.is_empty() {
            map.insert(
                key.to_string(),
                Entry {
                    items: items.to_vec(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
