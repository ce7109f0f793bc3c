//! # Analysis Pipeline
//! fetch-or-cache-hit → normalize → classify → aggregate.
//!
//! Stage flow per action:
//! `Idle → Fetching → Cached | Fetched` for the fetch trigger, and
//! `Idle → Normalizing → Classifying → Aggregated` for analyze (which reads
//! the cache only). `Rendered` is reached in the presentation layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::cache::{decode_items, encode_items, DynCache};
use crate::config::LimitConfig;
use crate::ingest::dedup_items;
use crate::ingest::types::{Fetcher, Item, Source};
use crate::normalize::normalize_text;
use crate::sentiment::{DynClassifier, Label, SentimentClassifier};
use crate::telemetry::anon_hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Fetching,
    Cached,
    Fetched,
    Normalizing,
    Classifying,
    Aggregated,
    Rendered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// What to do when classifying one item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorPolicy {
    /// Give the item `Label::Neutral`, flag it as `fallback`, keep going.
    #[default]
    DefaultLabel,
    /// Fail the whole analyze action.
    Abort,
}

impl FromStr for ItemErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default_label" | "default" | "skip" => Ok(ItemErrorPolicy::DefaultLabel),
            "abort" => Ok(ItemErrorPolicy::Abort),
            other => Err(anyhow::anyhow!("unknown item error policy '{other}'")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Nothing cached for the key; the user has to fetch first.
    #[error("no cached data for '{key}'")]
    NoData { key: String },
    #[error("classification failed for item {index}: {message}")]
    Inference { index: usize, message: String },
    #[error("cache unavailable: {0:#}")]
    Cache(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Cache,
    Upstream,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub key: String,
    pub source: Source,
    pub keyword: String,
    pub origin: Origin,
    pub items: Vec<Item>,
    /// Upstream or configuration problem that produced an empty result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub stage: Stage,
}

/// Per-item classification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub text: String,
    pub clean: String,
    pub label: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `true` when classification failed and the default label was used.
    pub fallback: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateCounts {
    pub total: usize,
    pub negative: usize,
    pub neutral: usize,
    pub positive: usize,
}

impl AggregateCounts {
    pub fn from_labels<I: IntoIterator<Item = Label>>(labels: I) -> Self {
        let mut c = Self::default();
        for l in labels {
            c.total += 1;
            match l {
                Label::Negative => c.negative += 1,
                Label::Neutral => c.neutral += 1,
                Label::Positive => c.positive += 1,
            }
        }
        c
    }

    pub fn from_results(results: &[AnalysisResult]) -> Self {
        Self::from_labels(results.iter().map(|r| r.label))
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Negative => self.negative,
            Label::Neutral => self.neutral,
            Label::Positive => self.positive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub key: String,
    pub source: Source,
    pub keyword: String,
    pub classifier: &'static str,
    pub results: Vec<AnalysisResult>,
    pub counts: AggregateCounts,
    /// Items that fell back to the default label.
    pub failures: usize,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ttl: Duration,
    pub limits: LimitConfig,
    pub item_error_policy: ItemErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(crate::config::DEFAULT_TTL_SECS),
            limits: LimitConfig::default(),
            item_error_policy: ItemErrorPolicy::default(),
        }
    }
}

pub struct Pipeline {
    cache: DynCache,
    fetchers: HashMap<Source, Arc<dyn Fetcher>>,
    classifier: DynClassifier,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        cache: DynCache,
        fetchers: Vec<Arc<dyn Fetcher>>,
        classifier: DynClassifier,
        cfg: PipelineConfig,
    ) -> Self {
        let fetchers = fetchers.into_iter().map(|f| (f.source(), f)).collect();
        Self {
            cache,
            fetchers,
            classifier,
            cfg,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    /// `true` when a fetcher for `source` exists and has credentials.
    pub fn is_configured(&self, source: Source) -> bool {
        self.fetchers
            .get(&source)
            .is_some_and(|f| f.is_configured())
    }

    /// Fetch trigger: cached list when live, otherwise call the fetcher and
    /// store what it returned (an empty result clears the key).
    pub async fn fetch(
        &self,
        source: Source,
        keyword: &str,
        limit: Option<usize>,
    ) -> Result<FetchOutcome, PipelineError> {
        let keyword = validate_keyword(keyword)?;
        let key = source.cache_key(keyword);
        let limit = self.cfg.limits.clamp(limit);
        debug!(%key, stage = %Stage::Idle, limit, "fetch requested");

        let cached = self.read_cache(&key).await?;
        if !cached.is_empty() {
            counter!("fetch_requests_total", "source" => source.as_str(), "origin" => "cache")
                .increment(1);
            debug!(%key, stage = %Stage::Cached, n = cached.len(), "cache hit");
            return Ok(FetchOutcome {
                key,
                source,
                keyword: keyword.to_string(),
                origin: Origin::Cache,
                items: cached,
                warning: None,
                stage: Stage::Cached,
            });
        }

        debug!(%key, stage = %Stage::Fetching, "cache miss, calling fetcher");
        let (items, warning) = self.fetch_upstream(source, keyword, limit).await;
        counter!("fetch_requests_total", "source" => source.as_str(), "origin" => "upstream")
            .increment(1);

        let encoded = encode_items(&items).map_err(PipelineError::Cache)?;
        self.cache
            .put(&key, &encoded, self.cfg.ttl)
            .await
            .map_err(PipelineError::Cache)?;

        info!(%key, stage = %Stage::Fetched, n = items.len(), "fetched and cached");
        Ok(FetchOutcome {
            key,
            source,
            keyword: keyword.to_string(),
            origin: Origin::Upstream,
            items,
            warning,
            stage: Stage::Fetched,
        })
    }

    /// Show-cached trigger.
    pub async fn cached(&self, source: Source, keyword: &str) -> Result<Vec<Item>, PipelineError> {
        let keyword = validate_keyword(keyword)?;
        self.read_cache(&source.cache_key(keyword)).await
    }

    /// Analyze trigger: classify whatever is cached for the key.
    pub async fn analyze(
        &self,
        source: Source,
        keyword: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        let keyword = validate_keyword(keyword)?;
        let key = source.cache_key(keyword);
        let items = self.read_cache(&key).await?;
        if items.is_empty() {
            return Err(PipelineError::NoData { key });
        }

        let classifier = Arc::clone(&self.classifier);
        let policy = self.cfg.item_error_policy;
        let (results, failures) = tokio::task::spawn_blocking(move || {
            classify_items(classifier.as_ref(), items, policy)
        })
        .await
        .map_err(|e| PipelineError::Inference {
            index: 0,
            message: format!("classification task panicked: {e}"),
        })??;

        let counts = AggregateCounts::from_results(&results);
        info!(
            %key,
            stage = %Stage::Aggregated,
            total = counts.total,
            negative = counts.negative,
            neutral = counts.neutral,
            positive = counts.positive,
            failures,
            "analysis complete"
        );

        Ok(AnalysisReport {
            key,
            source,
            keyword: keyword.to_string(),
            classifier: self.classifier.name(),
            results,
            counts,
            failures,
            analyzed_at: chrono::Utc::now(),
        })
    }

    async fn read_cache(&self, key: &str) -> Result<Vec<Item>, PipelineError> {
        let raw = self.cache.get(key).await.map_err(PipelineError::Cache)?;
        Ok(decode_items(&raw))
    }

    async fn fetch_upstream(
        &self,
        source: Source,
        keyword: &str,
        limit: usize,
    ) -> (Vec<Item>, Option<String>) {
        let Some(fetcher) = self.fetchers.get(&source).filter(|f| f.is_configured()) else {
            return (
                Vec::new(),
                Some(format!(
                    "{} is not configured; no credentials",
                    source.display_name()
                )),
            );
        };
        match fetcher.fetch(keyword, limit).await {
            Ok(items) => {
                let mut items = dedup_items(items);
                items.truncate(limit);
                (items, None)
            }
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "fetch failed, returning empty result");
                counter!("fetch_errors_total", "source" => source.as_str()).increment(1);
                (
                    Vec::new(),
                    Some(format!("{} fetch failed: {e}", source.display_name())),
                )
            }
        }
    }
}

/// Normalize then classify each item in order.
///
/// Returns the results and the number of items that fell back to the default label.
pub fn classify_items(
    classifier: &dyn SentimentClassifier,
    items: Vec<Item>,
    policy: ItemErrorPolicy,
) -> Result<(Vec<AnalysisResult>, usize), PipelineError> {
    debug!(stage = %Stage::Normalizing, n = items.len());
    let cleaned: Vec<(Item, String)> = items
        .into_iter()
        .map(|it| {
            let clean = normalize_text(&it.text);
            (it, clean)
        })
        .collect();

    debug!(stage = %Stage::Classifying, classifier = classifier.name());
    let mut failures = 0usize;
    let mut results = Vec::with_capacity(cleaned.len());
    for (index, (item, clean)) in cleaned.into_iter().enumerate() {
        let (label, fallback) = match classifier.classify(&clean) {
            Ok(label) => (label, false),
            Err(e) => match policy {
                ItemErrorPolicy::Abort => {
                    return Err(PipelineError::Inference {
                        index,
                        message: format!("{e:#}"),
                    })
                }
                ItemErrorPolicy::DefaultLabel => {
                    warn!(
                        index,
                        id = %anon_hash(&clean),
                        error = %e,
                        "classification failed, using default label"
                    );
                    counter!("classify_failures_total").increment(1);
                    failures += 1;
                    (Label::default(), true)
                }
            },
        };
        counter!("classify_items_total", "label" => label.as_str()).increment(1);
        results.push(AnalysisResult {
            text: item.text,
            clean,
            label,
            title: item.title,
            url: item.url,
            fallback,
        });
    }
    Ok((results, failures))
}

fn validate_keyword(keyword: &str) -> Result<&str, PipelineError> {
    let k = keyword.trim();
    if k.is_empty() {
        return Err(PipelineError::InvalidInput("keyword must not be empty".into()));
    }
    if k.chars().count() > 200 {
        return Err(PipelineError::InvalidInput("keyword is too long".into()));
    }
    Ok(k)
}
