// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod chart;
pub mod config;
pub mod export;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod sentiment;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::ingest::types::{Fetcher, Item, Source};
pub use crate::pipeline::{AnalysisReport, Pipeline, PipelineError};
pub use crate::sentiment::{Label, SentimentClassifier};
