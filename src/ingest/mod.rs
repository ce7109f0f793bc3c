// src/ingest/mod.rs
pub mod providers;
pub mod retry;
pub mod types;

use anyhow::{Context, Result};
use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, HttpConfig};
use crate::ingest::providers::{NewsFetcher, TwitterFetcher, YoutubeFetcher};
use crate::ingest::types::{Fetcher, Item};

/// Shared HTTP client for all fetchers.
pub fn build_http_client(cfg: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("building http client")
}

/// One fetcher per source. Missing credentials leave a fetcher registered
/// but disabled; that is logged once here.
pub fn build_fetchers(cfg: &AppConfig, client: reqwest::Client) -> Vec<Arc<dyn Fetcher>> {
    let fetchers: Vec<Arc<dyn Fetcher>> = vec![
        Arc::new(TwitterFetcher::new(
            client.clone(),
            cfg.twitter.bearer_token.clone(),
            cfg.twitter.base_url.clone(),
            cfg.twitter.lang.clone(),
            cfg.retry.clone(),
        )),
        Arc::new(YoutubeFetcher::new(
            client.clone(),
            cfg.youtube.api_key.clone(),
            cfg.youtube.base_url.clone(),
            cfg.youtube.max_videos,
            cfg.retry.clone(),
        )),
        Arc::new(NewsFetcher::new(
            client,
            cfg.news.api_key.clone(),
            cfg.news.base_url.clone(),
            cfg.news.language.clone(),
            cfg.retry.clone(),
        )),
    ];

    for f in &fetchers {
        if f.is_configured() {
            tracing::info!(source = f.source().as_str(), "source enabled");
        } else {
            tracing::warn!(
                source = f.source().as_str(),
                "source disabled: no credentials configured"
            );
        }
    }
    fetchers
}

/// Drop items with blank text and exact duplicate texts, keeping first occurrences.
pub fn dedup_items(items: Vec<Item>) -> Vec<Item> {
    let before = items.len();
    let mut seen: HashSet<String> = HashSet::new();
    let kept: Vec<Item> = items
        .into_iter()
        .filter(|it| !it.text.trim().is_empty() && seen.insert(it.text.trim().to_string()))
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        counter!("ingest_dedup_total").increment(dropped as u64);
        tracing::debug!(dropped, "dropped blank or duplicate items");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_and_order() {
        let items = vec![
            Item::text("abc"),
            Item::text("  "),
            Item::text("def"),
            Item::text("abc "),
            Item::text("ghi"),
        ];
        let kept = dedup_items(items);
        let texts: Vec<&str> = kept.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "def", "ghi"]);
    }

    #[test]
    fn http_client_builds_from_defaults() {
        assert!(build_http_client(&HttpConfig::default()).is_ok());
    }
}
