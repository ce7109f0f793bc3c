// src/ingest/providers/news.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::ingest::retry::{send_with_retry, RetryPolicy};
use crate::ingest::types::{Fetcher, Item, Source};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";

/// Accepted `pageSize` range of `/v2/everything`.
const MIN_PAGE: usize = 1;
const MAX_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Option<Vec<Article>>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "publishedAt", default)]
    published_at: Option<String>,
}

/// Headline search against NewsAPI.org.
pub struct NewsFetcher {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    language: Option<String>,
    retry: RetryPolicy,
}

impl NewsFetcher {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: Option<String>,
        language: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            language: language.filter(|l| !l.is_empty()),
            retry,
        }
    }
}

pub(crate) fn parse_articles(body: &str) -> Result<Vec<Item>> {
    let resp: NewsApiResponse =
        serde_json::from_str(body).context("parsing newsapi response")?;
    if resp.status != "ok" {
        return Err(anyhow!(
            "newsapi error {}: {}",
            resp.code.unwrap_or_else(|| "unknown".into()),
            resp.message.unwrap_or_default()
        ));
    }

    let mut out = Vec::new();
    for a in resp.articles.unwrap_or_default() {
        let title = decode(a.title.as_deref().unwrap_or_default());
        // NewsAPI marks takedowns with this placeholder title.
        if title.is_empty() || title == "[Removed]" {
            continue;
        }
        let text = match a.description.as_deref().map(decode) {
            Some(d) if !d.is_empty() => format!("{title}. {d}"),
            _ => title.clone(),
        };
        out.push(Item {
            text,
            title: Some(title),
            url: a.url,
            published_at: a.published_at,
            engagement: None,
        });
    }
    Ok(out)
}

fn decode(s: &str) -> String {
    html_escape::decode_html_entities(s).trim().to_string()
}

#[async_trait]
impl Fetcher for NewsFetcher {
    async fn fetch(&self, keyword: &str, limit: usize) -> Result<Vec<Item>> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };

        let url = format!("{}/v2/everything", self.base_url);
        let page_size = limit.clamp(MIN_PAGE, MAX_PAGE).to_string();
        let resp = send_with_retry(&self.retry, "news", || {
            let mut req = self
                .client
                .get(&url)
                .header("X-Api-Key", key)
                .query(&[
                    ("q", keyword.trim()),
                    ("pageSize", page_size.as_str()),
                    ("sortBy", "publishedAt"),
                ]);
            if let Some(lang) = self.language.as_deref() {
                req = req.query(&[("language", lang)]);
            }
            req
        })
        .await?;
        counter!("upstream_calls_total", "source" => "news").increment(1);

        let body = resp.text().await.context("newsapi http .text()")?;
        let mut items = parse_articles(&body)?;
        items.truncate(limit);
        Ok(items)
    }

    fn source(&self) -> Source {
        Source::News
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
