// src/ingest/providers/twitter.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::ingest::retry::{send_with_retry, RetryPolicy};
use crate::ingest::types::{Engagement, Fetcher, Item, Source};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// Accepted `max_results` range of the recent search endpoint.
const MIN_RESULTS: usize = 10;
const MAX_RESULTS: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<Vec<Tweet>>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: Option<u64>,
    #[serde(default)]
    retweet_count: Option<u64>,
    #[serde(default)]
    reply_count: Option<u64>,
}

/// Recent-search client for the Twitter/X v2 API.
pub struct TwitterFetcher {
    client: reqwest::Client,
    bearer_token: Option<String>,
    base_url: String,
    lang: String,
    retry: RetryPolicy,
}

impl TwitterFetcher {
    pub fn new(
        client: reqwest::Client,
        bearer_token: Option<String>,
        base_url: Option<String>,
        lang: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            bearer_token: bearer_token.filter(|t| !t.trim().is_empty()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            lang,
            retry,
        }
    }

    /// Search query: keyword in the configured language, retweets excluded.
    pub fn build_query(&self, keyword: &str) -> String {
        let mut q = keyword.trim().to_string();
        if !self.lang.is_empty() {
            q.push_str(&format!(" lang:{}", self.lang));
        }
        q.push_str(" -is:retweet");
        q
    }

    pub(crate) fn parse_body(body: &str) -> Result<Vec<Item>> {
        let resp: SearchResponse =
            serde_json::from_str(body).context("parsing twitter search response")?;
        let items = resp
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|t| Item {
                text: t.text,
                title: None,
                url: None,
                published_at: t.created_at,
                engagement: t.public_metrics.map(|m| Engagement {
                    likes: m.like_count,
                    reposts: m.retweet_count,
                    replies: m.reply_count,
                }),
            })
            .collect();
        Ok(items)
    }
}

/// Clamp a requested count into the endpoint's accepted `max_results`.
pub fn clamp_max_results(limit: usize) -> usize {
    limit.clamp(MIN_RESULTS, MAX_RESULTS)
}

#[async_trait]
impl Fetcher for TwitterFetcher {
    async fn fetch(&self, keyword: &str, limit: usize) -> Result<Vec<Item>> {
        let Some(token) = self.bearer_token.as_deref() else {
            return Ok(Vec::new());
        };

        let url = format!("{}/2/tweets/search/recent", self.base_url);
        let query = self.build_query(keyword);
        let max_results = clamp_max_results(limit).to_string();

        let resp = send_with_retry(&self.retry, "twitter", || {
            self.client
                .get(&url)
                .bearer_auth(token)
                .query(&[
                    ("query", query.as_str()),
                    ("max_results", max_results.as_str()),
                    ("tweet.fields", "created_at,public_metrics"),
                ])
        })
        .await?;
        counter!("upstream_calls_total", "source" => "twitter").increment(1);

        let body = resp.text().await.context("twitter http .text()")?;
        let mut items = Self::parse_body(&body)?;
        items.truncate(limit);
        Ok(items)
    }

    fn source(&self) -> Source {
        Source::Twitter
    }

    fn is_configured(&self) -> bool {
        self.bearer_token.is_some()
    }
}
