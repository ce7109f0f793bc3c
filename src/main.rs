//! Keyword Sentiment Dashboard — Binary Entrypoint
//! Boots the Axum HTTP server: configuration, cache, classifier, fetchers, routes.
//!
//! See `README.md` for quickstart and environment variables.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use sentiment_dashboard::metrics::Metrics;
use sentiment_dashboard::telemetry::init_tracing;
use sentiment_dashboard::{create_router, AppConfig, AppState};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        cache = ?cfg.cache.backend,
        redis = %cfg.cache.redis.redacted(),
        ttl_secs = cfg.cache.ttl_secs,
        classifier = ?cfg.classifier.backend,
        "configuration loaded"
    );

    let metrics = Metrics::init(cfg.cache.ttl_secs)?;

    // Cache unreachable or model unloadable: refuse to start.
    let state = AppState::bootstrap(&cfg).await?;
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
