use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, warn};

use crate::cache;
use crate::chart::{pie_chart, PieChart};
use crate::config::{AppConfig, LimitConfig};
use crate::export;
use crate::history::History;
use crate::ingest::types::{Item, Source};
use crate::ingest::{build_fetchers, build_http_client};
use crate::pipeline::{
    AnalysisReport, FetchOutcome, Pipeline, PipelineConfig, PipelineError, Stage,
};
use crate::sentiment::build_classifier;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    history: Arc<History>,
    limits: LimitConfig,
    ui_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, session_capacity: usize) -> Self {
        let limits = pipeline.config().limits;
        Self {
            pipeline: Arc::new(pipeline),
            history: Arc::new(History::with_capacity(session_capacity)),
            limits,
            ui_dir: None,
        }
    }

    pub fn with_ui_dir(mut self, dir: PathBuf) -> Self {
        self.ui_dir = Some(dir);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Wire cache, classifier and fetchers from configuration.
    /// An unreachable cache or a configured model that fails to load is fatal.
    pub async fn bootstrap(cfg: &AppConfig) -> anyhow::Result<Self> {
        let cache = cache::connect(&cfg.cache)
            .await
            .with_context(|| format!("cache store unavailable ({})", cfg.cache.redis.redacted()))?;

        let classifier_cfg = cfg.classifier.clone();
        let classifier = tokio::task::spawn_blocking(move || build_classifier(&classifier_cfg))
            .await
            .context("classifier loader panicked")??;

        let client = build_http_client(&cfg.http)?;
        let fetchers = build_fetchers(cfg, client);

        let pipeline = Pipeline::new(
            cache,
            fetchers,
            classifier,
            PipelineConfig {
                ttl: Duration::from_secs(cfg.cache.ttl_secs),
                limits: cfg.limits,
                item_error_policy: cfg.classifier.item_error_policy,
            },
        );
        Ok(Self::new(pipeline, cfg.session_capacity).with_ui_dir(cfg.ui_dir.clone()))
    }
}

pub fn create_router(state: AppState) -> Router {
    let ui_dir = state.ui_dir.clone();
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/sources", get(sources))
        .route("/api/fetch", post(fetch))
        .route("/api/cached", get(cached))
        .route("/api/analyze", post(analyze))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match ui_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, state, message) = match self {
            ApiError::Pipeline(e) => {
                let (status, state) = match &e {
                    PipelineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                    PipelineError::NoData { .. } => (StatusCode::NOT_FOUND, "no_data"),
                    PipelineError::Inference { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "inference_error")
                    }
                    PipelineError::Cache(_) => (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable"),
                };
                if status.is_server_error() {
                    error!(error = %e, "request failed");
                }
                (status, state, e.to_string())
            }
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "invalid_input", m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "no_report", m),
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{e:#}"))
            }
        };
        (status, Json(json!({ "error": message, "state": state }))).into_response()
    }
}

fn parse_source(raw: &str) -> Result<Source, ApiError> {
    Source::from_str(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/* ----------------------------
Handlers
---------------------------- */

#[derive(Serialize)]
struct SourceInfo {
    id: Source,
    name: &'static str,
    configured: bool,
}

#[derive(Serialize)]
struct SourcesResp {
    sources: Vec<SourceInfo>,
    limits: LimitConfig,
    classifier: &'static str,
    cache: &'static str,
}

async fn sources(State(state): State<AppState>) -> Json<SourcesResp> {
    let sources = Source::ALL
        .iter()
        .map(|&s| SourceInfo {
            id: s,
            name: s.display_name(),
            configured: state.pipeline.is_configured(s),
        })
        .collect();
    Json(SourcesResp {
        sources,
        limits: state.limits,
        classifier: state.pipeline.classifier_name(),
        cache: state.pipeline.cache_backend(),
    })
}

#[derive(Deserialize)]
struct FetchReq {
    source: String,
    keyword: String,
    #[serde(default)]
    limit: Option<usize>,
}

async fn fetch(
    State(state): State<AppState>,
    body: Result<Json<FetchReq>, JsonRejection>,
) -> Result<Json<FetchOutcome>, ApiError> {
    let Json(body) = body?;
    let source = parse_source(&body.source)?;
    let outcome = state
        .pipeline
        .fetch(source, &body.keyword, body.limit)
        .await?;
    if let Some(w) = &outcome.warning {
        warn!(key = %outcome.key, warning = %w, "fetch returned a warning");
    }
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct KeyQuery {
    source: String,
    keyword: String,
}

#[derive(Serialize)]
struct CachedResp {
    key: String,
    count: usize,
    items: Vec<Item>,
}

async fn cached(
    State(state): State<AppState>,
    q: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Json<CachedResp>, ApiError> {
    let Query(q) = q?;
    let source = parse_source(&q.source)?;
    let items = state.pipeline.cached(source, &q.keyword).await?;
    Ok(Json(CachedResp {
        key: source.cache_key(&q.keyword),
        count: items.len(),
        items,
    }))
}

#[derive(Deserialize)]
struct AnalyzeReq {
    source: String,
    keyword: String,
}

#[derive(Serialize)]
struct AnalyzeResp {
    #[serde(flatten)]
    report: AnalysisReport,
    chart: PieChart,
    stage: Stage,
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeReq>, JsonRejection>,
) -> Result<Json<AnalyzeResp>, ApiError> {
    let Json(body) = body?;
    let source = parse_source(&body.source)?;
    let report = state.pipeline.analyze(source, &body.keyword).await?;
    let chart = pie_chart(&report.counts);
    state.history.push(report.clone());
    debug!(key = %report.key, stage = %Stage::Rendered, "report rendered");
    Ok(Json(AnalyzeResp {
        report,
        chart,
        stage: Stage::Rendered,
    }))
}

fn latest_report(state: &AppState, q: &KeyQuery) -> Result<Arc<AnalysisReport>, ApiError> {
    let source = parse_source(&q.source)?;
    let key = source.cache_key(&q.keyword);
    state
        .history
        .get(&key)
        .ok_or_else(|| ApiError::NotFound(format!("no analysis for '{key}'; run analyze first")))
}

fn download(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn export_csv(
    State(state): State<AppState>,
    q: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = q?;
    let report = latest_report(&state, &q)?;
    let bytes = export::to_csv(&report).map_err(ApiError::Internal)?;
    Ok(download(export::CSV_CONTENT_TYPE, export::CSV_FILE_NAME, bytes))
}

async fn export_xlsx(
    State(state): State<AppState>,
    q: Result<Query<KeyQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = q?;
    let report = latest_report(&state, &q)?;
    let bytes = export::to_xlsx(&report).map_err(ApiError::Internal)?;
    Ok(download(export::XLSX_CONTENT_TYPE, export::XLSX_FILE_NAME, bytes))
}
