use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shuttle_axum::axum::{routing::get, Router};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured cache TTL.
    /// Only one recorder can exist per process.
    pub fn init(ttl_secs: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        describe_counter!("fetch_requests_total", "Fetch triggers by source and origin");
        describe_counter!("fetch_errors_total", "Upstream fetches that failed");
        describe_counter!("upstream_calls_total", "HTTP calls made to upstream APIs");
        describe_counter!("ingest_dedup_total", "Blank or duplicate fetched items dropped");
        describe_counter!("cache_decode_skipped_total", "Cached entries that failed to decode");
        describe_counter!("classify_items_total", "Classified items by label");
        describe_counter!("classify_failures_total", "Items that fell back to the default label");
        describe_gauge!("cache_ttl_secs", "Configured cache TTL");

        // Absolute TTL, no sliding refresh.
        gauge!("cache_ttl_secs").set(ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
