// src/ingest/providers/youtube.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::ingest::retry::{send_with_retry, RetryPolicy, UpstreamError};
use crate::ingest::types::{Engagement, Fetcher, Item, Source};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// `maxResults` ceiling of the commentThreads endpoint.
const MAX_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadsResponse {
    #[serde(default)]
    items: Vec<Thread>,
}

#[derive(Debug, Deserialize)]
struct Thread {
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
struct ThreadSnippet {
    #[serde(rename = "topLevelComment")]
    top_level_comment: Comment,
    #[serde(rename = "totalReplyCount", default)]
    total_reply_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
struct CommentSnippet {
    #[serde(rename = "textDisplay")]
    text_display: String,
    #[serde(rename = "likeCount", default)]
    like_count: Option<u64>,
    #[serde(rename = "publishedAt", default)]
    published_at: Option<String>,
}

/// Top-level comments from the first videos matching a keyword (YouTube Data API v3).
pub struct YoutubeFetcher {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    max_videos: usize,
    retry: RetryPolicy,
}

impl YoutubeFetcher {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: Option<String>,
        max_videos: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_videos: max_videos.clamp(1, 50),
            retry,
        }
    }

    async fn video_ids(&self, key: &str, keyword: &str) -> Result<Vec<String>> {
        let url = format!("{}/youtube/v3/search", self.base_url);
        let max = self.max_videos.to_string();
        let resp = send_with_retry(&self.retry, "youtube", || {
            self.client.get(&url).query(&[
                ("part", "id"),
                ("type", "video"),
                ("q", keyword.trim()),
                ("maxResults", max.as_str()),
                ("key", key),
            ])
        })
        .await?;
        counter!("upstream_calls_total", "source" => "youtube").increment(1);
        let body = resp.text().await.context("youtube search .text()")?;
        parse_video_ids(&body)
    }

    async fn comments(&self, key: &str, video_id: &str, page: usize) -> Result<Vec<Item>> {
        let url = format!("{}/youtube/v3/commentThreads", self.base_url);
        let max = page.to_string();
        let resp = send_with_retry(&self.retry, "youtube", || {
            self.client.get(&url).query(&[
                ("part", "snippet"),
                ("videoId", video_id),
                ("maxResults", max.as_str()),
                ("textFormat", "plainText"),
                ("key", key),
            ])
        })
        .await?;
        counter!("upstream_calls_total", "source" => "youtube").increment(1);
        let body = resp.text().await.context("youtube commentThreads .text()")?;
        parse_comments(&body)
    }
}

pub(crate) fn parse_video_ids(body: &str) -> Result<Vec<String>> {
    let resp: SearchResponse =
        serde_json::from_str(body).context("parsing youtube search response")?;
    Ok(resp.items.into_iter().filter_map(|i| i.id.video_id).collect())
}

pub(crate) fn parse_comments(body: &str) -> Result<Vec<Item>> {
    let resp: ThreadsResponse =
        serde_json::from_str(body).context("parsing youtube commentThreads response")?;
    Ok(resp
        .items
        .into_iter()
        .map(|t| {
            let c = t.snippet.top_level_comment.snippet;
            Item {
                text: c.text_display,
                title: None,
                url: None,
                published_at: c.published_at,
                engagement: Some(Engagement {
                    likes: c.like_count,
                    reposts: None,
                    replies: t.snippet.total_reply_count,
                }),
            }
        })
        .collect())
}

#[async_trait]
impl Fetcher for YoutubeFetcher {
    async fn fetch(&self, keyword: &str, limit: usize) -> Result<Vec<Item>> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(limit);
        for vid in self.video_ids(key, keyword).await? {
            let page = (limit - out.len()).clamp(1, MAX_PAGE);
            match self.comments(key, &vid, page).await {
                Ok(items) => out.extend(items),
                // Comments disabled on this video.
                Err(e) if is_forbidden(&e) => {
                    tracing::debug!(video = %vid, "comments unavailable, skipping video");
                    continue;
                }
                Err(e) => return Err(e),
            }
            if out.len() >= limit {
                break;
            }
        }
        out.truncate(limit);
        Ok(out)
    }

    fn source(&self) -> Source {
        Source::Youtube
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn is_forbidden(e: &anyhow::Error) -> bool {
    e.downcast_ref::<UpstreamError>()
        .and_then(UpstreamError::status)
        == Some(403)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_ids_and_skips_channels() {
        let body = r#"{"items": [
            {"id": {"kind": "youtube#video", "videoId": "abc"}},
            {"id": {"kind": "youtube#channel", "channelId": "zzz"}},
            {"id": {"kind": "youtube#video", "videoId": "def"}}
        ]}"#;
        assert_eq!(parse_video_ids(body).unwrap(), vec!["abc", "def"]);
    }

    #[test]
    fn parses_top_level_comments() {
        let body = r#"{"items": [{
            "snippet": {
                "totalReplyCount": 2,
                "topLevelComment": {"snippet": {
                    "textDisplay": "Çok iyi anlatmışsınız",
                    "likeCount": 7,
                    "publishedAt": "2024-02-02T00:00:00Z"
                }}
            }
        }]}"#;
        let items = parse_comments(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Çok iyi anlatmışsınız");
        let e = items[0].engagement.as_ref().unwrap();
        assert_eq!((e.likes, e.replies), (Some(7), Some(2)));
    }

    #[tokio::test]
    async fn unconfigured_returns_empty() {
        let f = YoutubeFetcher::new(
            reqwest::Client::new(),
            Some("  ".into()),
            None,
            5,
            RetryPolicy::immediate(1),
        );
        assert!(!f.is_configured());
        assert!(f.fetch("kedi", 30).await.unwrap().is_empty());
    }
}
