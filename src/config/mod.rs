// src/config/mod.rs
//! Runtime configuration.
//!
//! Precedence: environment variables (including `.env` loaded by the binary)
//! override the optional TOML file, which overrides built-in defaults.
//! Credentials are read from the environment only.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::retry::RetryPolicy;
use crate::pipeline::ItemErrorPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";
pub const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";

/// Seconds a cached `(source, keyword)` list stays alive.
pub const DEFAULT_TTL_SECS: u64 = 600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("{0} points to non-existent path")]
    MissingFile(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierBackend {
    Bert,
    Lexicon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedisTarget {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub tls: bool,
}

impl RedisTarget {
    /// Connection URL; `REDIS_URL` wins over the individual parts.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let scheme = if self.tls { "rediss" } else { "redis" };
        match &self.password {
            Some(pw) => format!(
                "{scheme}://:{}@{}:{}/",
                urlencoding::encode(pw),
                self.host,
                self.port
            ),
            None => format!("{scheme}://{}:{}/", self.host, self.port),
        }
    }

    /// Same as `connection_url` with the password masked, for logs.
    pub fn redacted(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        match (&self.url, &self.password) {
            (Some(_), _) => "REDIS_URL".to_string(),
            (None, Some(_)) => format!("{scheme}://:***@{}:{}/", self.host, self.port),
            (None, None) => format!("{scheme}://{}:{}/", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis: RedisTarget,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    pub model_dir: Option<PathBuf>,
    pub item_error_policy: ItemErrorPolicy,
}

/// Bounds of the item-count slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct LimitConfig {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            min: 10,
            max: 100,
            default: 30,
        }
    }
}

impl LimitConfig {
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).clamp(self.min, self.max)
    }

    fn sanitized(mut self) -> Self {
        if self.min == 0 {
            self.min = 1;
        }
        if self.min > self.max {
            std::mem::swap(&mut self.min, &mut self.max);
        }
        self.default = self.default.clamp(self.min, self.max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 4,
            timeout_secs: 10,
            user_agent: concat!("sentiment-dashboard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwitterConfig {
    pub bearer_token: Option<String>,
    pub lang: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YoutubeConfig {
    pub api_key: Option<String>,
    pub max_videos: usize,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsConfig {
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub classifier: ClassifierConfig,
    pub limits: LimitConfig,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
    pub twitter: TwitterConfig,
    pub youtube: YoutubeConfig,
    pub news: NewsConfig,
    pub ui_dir: PathBuf,
    /// Number of analysis reports kept for export.
    pub session_capacity: usize,
}

/* ----------------------------
TOML file schema (all optional)
---------------------------- */

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub cache: FileCache,
    pub classifier: FileClassifier,
    pub limits: LimitConfig,
    pub http: HttpConfig,
    pub retry: RetryPolicy,
    pub twitter: FileTwitter,
    pub youtube: FileYoutube,
    pub news: FileNews,
    pub ui_dir: Option<PathBuf>,
    pub session_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileCache {
    pub backend: Option<CacheBackend>,
    pub ttl_secs: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileClassifier {
    pub backend: Option<ClassifierBackend>,
    pub model_dir: Option<PathBuf>,
    pub item_error_policy: Option<ItemErrorPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileTwitter {
    pub lang: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileYoutube {
    pub max_videos: Option<usize>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileNews {
    pub language: Option<String>,
    pub base_url: Option<String>,
}

impl FileSettings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// `$DASHBOARD_CONFIG_PATH`, then `config/dashboard.toml`, else defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingFile(ENV_CONFIG_PATH).into());
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }
}

impl AppConfig {
    /// Load file settings and overlay the process environment.
    pub fn load() -> Result<Self> {
        let file = FileSettings::load_default()?;
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    /// Build from explicit file settings and a key/value map (tests).
    pub fn from_map(file: FileSettings, env: &HashMap<String, String>) -> Result<Self> {
        Self::resolve(file, |k| env.get(k).cloned())
    }

    pub fn resolve<F>(file: FileSettings, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let ttl_secs = match get("CACHE_TTL_SECS") {
            Some(v) => parse_u64("CACHE_TTL_SECS", &v)?,
            None => file.cache.ttl_secs.unwrap_or(DEFAULT_TTL_SECS),
        }
        .max(1);

        let cache_backend = match get("CACHE_BACKEND") {
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "redis" => CacheBackend::Redis,
                "memory" => CacheBackend::Memory,
                _ => return Err(invalid("CACHE_BACKEND", v)),
            },
            None => file.cache.backend.unwrap_or(CacheBackend::Redis),
        };

        let port = match get("REDIS_PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| invalid("REDIS_PORT", v))?,
            None => file.cache.port.unwrap_or(6379),
        };

        let redis = RedisTarget {
            url: get("REDIS_URL"),
            host: get("REDIS_HOST")
                .or(file.cache.host)
                .unwrap_or_else(|| "localhost".to_string()),
            port,
            password: get("REDIS_PASSWORD"),
            tls: match get("REDIS_TLS") {
                Some(v) => parse_bool("REDIS_TLS", &v)?,
                None => file.cache.tls.unwrap_or(false),
            },
        };

        let model_dir = get("SENTIMENT_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.classifier.model_dir);
        let classifier_backend = match get("CLASSIFIER_BACKEND") {
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "bert" => ClassifierBackend::Bert,
                "lexicon" => ClassifierBackend::Lexicon,
                _ => return Err(invalid("CLASSIFIER_BACKEND", v)),
            },
            None => file.classifier.backend.unwrap_or(if model_dir.is_some() {
                ClassifierBackend::Bert
            } else {
                ClassifierBackend::Lexicon
            }),
        };
        let item_error_policy = match get("ITEM_ERROR_POLICY") {
            Some(v) => v
                .parse::<ItemErrorPolicy>()
                .map_err(|_| invalid("ITEM_ERROR_POLICY", v))?,
            None => file.classifier.item_error_policy.unwrap_or_default(),
        };

        Ok(Self {
            cache: CacheConfig {
                backend: cache_backend,
                redis,
                ttl_secs,
            },
            classifier: ClassifierConfig {
                backend: classifier_backend,
                model_dir,
                item_error_policy,
            },
            limits: file.limits.sanitized(),
            http: file.http,
            retry: file.retry,
            twitter: TwitterConfig {
                bearer_token: get("TWITTER_BEARER_TOKEN").or_else(|| get("BEARER_TOKEN")),
                lang: get("TWITTER_LANG")
                    .or(file.twitter.lang)
                    .unwrap_or_else(|| "tr".to_string()),
                base_url: file.twitter.base_url,
            },
            youtube: YoutubeConfig {
                api_key: get("YT_API_KEY"),
                max_videos: file.youtube.max_videos.unwrap_or(5),
                base_url: file.youtube.base_url,
            },
            news: NewsConfig {
                api_key: get("NEWS_API_KEY"),
                language: get("NEWS_LANGUAGE").or(file.news.language),
                base_url: file.news.base_url,
            },
            ui_dir: get("UI_DIR")
                .map(PathBuf::from)
                .or(file.ui_dir)
                .unwrap_or_else(|| PathBuf::from("ui")),
            session_capacity: file.session_capacity.unwrap_or(64).max(1),
        })
    }
}

fn invalid(key: &'static str, value: String) -> anyhow::Error {
    ConfigError::Invalid { key, value }.into()
}

fn parse_u64(key: &'static str, v: &str) -> Result<u64> {
    v.parse::<u64>().map_err(|_| invalid(key, v.to_string()))
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, v.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_anything() {
        let cfg = AppConfig::from_map(FileSettings::default(), &HashMap::new()).unwrap();
        assert_eq!(cfg.cache.ttl_secs, 600);
        assert_eq!(cfg.cache.backend, CacheBackend::Redis);
        assert_eq!(cfg.cache.redis.connection_url(), "redis://localhost:6379/");
        assert_eq!(cfg.classifier.backend, ClassifierBackend::Lexicon);
        assert_eq!(cfg.limits, LimitConfig::default());
        assert!(cfg.twitter.bearer_token.is_none());
        assert!(cfg.youtube.api_key.is_none());
        assert!(cfg.news.api_key.is_none());
    }

    #[test]
    fn model_dir_selects_bert_backend() {
        let cfg = AppConfig::from_map(
            FileSettings::default(),
            &env(&[("SENTIMENT_MODEL_DIR", "/models/turkish")]),
        )
        .unwrap();
        assert_eq!(cfg.classifier.backend, ClassifierBackend::Bert);
    }

    #[test]
    fn env_overrides_file() {
        let file: FileSettings = toml::from_str(
            r#"
            [cache]
            ttl_secs = 120
            host = "cache.internal"
            [twitter]
            lang = "en"
            "#,
        )
        .unwrap();
        let cfg = AppConfig::from_map(
            file,
            &env(&[("CACHE_TTL_SECS", "30"), ("BEARER_TOKEN", "abc")]),
        )
        .unwrap();
        assert_eq!(cfg.cache.ttl_secs, 30);
        assert_eq!(cfg.cache.redis.host, "cache.internal");
        assert_eq!(cfg.twitter.lang, "en");
        assert_eq!(cfg.twitter.bearer_token.as_deref(), Some("abc"));
    }

    #[test]
    fn password_and_tls_build_rediss_url() {
        let cfg = AppConfig::from_map(
            FileSettings::default(),
            &env(&[
                ("REDIS_HOST", "r.example"),
                ("REDIS_PORT", "6380"),
                ("REDIS_PASSWORD", "p@ss:w"),
                ("REDIS_TLS", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(
            cfg.cache.redis.connection_url(),
            "rediss://:p%40ss%3Aw@r.example:6380/"
        );
        assert!(!cfg.cache.redis.redacted().contains("p%40ss"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = AppConfig::from_map(FileSettings::default(), &env(&[("REDIS_PORT", "x")]))
            .unwrap_err();
        assert!(err.to_string().contains("REDIS_PORT"));
    }

    #[test]
    fn limits_are_sanitized_and_clamped() {
        let file: FileSettings = toml::from_str(
            r#"
            [limits]
            min = 50
            max = 20
            default = 99
            "#,
        )
        .unwrap();
        let cfg = AppConfig::from_map(file, &HashMap::new()).unwrap();
        assert_eq!((cfg.limits.min, cfg.limits.max), (20, 50));
        assert_eq!(cfg.limits.default, 50);
        assert_eq!(cfg.limits.clamp(Some(5)), 20);
        assert_eq!(cfg.limits.clamp(None), 50);
    }
}
