// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream the dashboard can pull snippets from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Twitter,
    Youtube,
    News,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Twitter, Source::Youtube, Source::News];

    /// Lowercase name; also the prefix of the cache key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Twitter => "twitter",
            Source::Youtube => "youtube",
            Source::News => "news",
        }
    }

    /// Human label for the UI selector.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Twitter => "Twitter",
            Source::Youtube => "YouTube",
            Source::News => "News",
        }
    }

    /// Cache key for `(source, keyword)`: `"{source}:{keyword}"`.
    pub fn cache_key(&self, keyword: &str) -> String {
        format!("{}:{}", self.as_str(), keyword.trim())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twitter" | "x" => Ok(Source::Twitter),
            "youtube" | "yt" => Ok(Source::Youtube),
            "news" | "newsapi" => Ok(Source::News),
            other => Err(anyhow::anyhow!("unknown source '{other}'")),
        }
    }
}

/// Engagement counters reported by social platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reposts: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<u64>,
}

/// One fetched snippet. Immutable once produced by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<Engagement>,
}

impl Item {
    /// Plain text item without metadata.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            url: None,
            published_at: None,
            engagement: None,
        }
    }
}

/// Adapter that turns `(keyword, limit)` into items from one upstream API.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch at most `limit` items. Unconfigured fetchers return `Ok(vec![])`.
    async fn fetch(&self, keyword: &str, limit: usize) -> Result<Vec<Item>>;
    fn source(&self) -> Source;
    /// `false` when credentials are missing; the source is shown as disabled.
    fn is_configured(&self) -> bool;
}
