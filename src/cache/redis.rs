// src/cache/redis.rs
//! Redis list store. `put` is one MULTI/EXEC transaction: DEL, RPUSH, EXPIRE.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

use super::CacheStore;

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect and PING. Failing here is meant to stop startup.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis connection url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connecting to redis")?;
        let store = Self { conn };
        store.ping().await?;
        info!(target: "cache", "redis connection established");
        Ok(store)
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn
            .lrange(key, 0, -1)
            .await
            .with_context(|| format!("LRANGE {key}"))?;
        Ok(items)
    }

    async fn put(&self, key: &str, items: &[String], ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.rpush(key, items)
                .ignore()
                .cmd("EXPIRE")
                .arg(key)
                .arg(ttl.as_secs().max(1))
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .with_context(|| format!("replacing cache list {key}"))?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis PING")?;
        anyhow::ensure!(pong == "PONG", "unexpected PING reply '{pong}'");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
