// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health, GET /api/sources
// - POST /api/analyze before any fetch → 404 no_data
// - POST /api/fetch → POST /api/analyze → GET /api/export/{csv,xlsx}
// - input errors → 400 JSON, including malformed bodies and queries

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use sentiment_dashboard::api::{create_router, AppState};
use sentiment_dashboard::cache::MemoryCache;
use sentiment_dashboard::ingest::types::{Fetcher, Item, Source};
use sentiment_dashboard::pipeline::{Pipeline, PipelineConfig};
use sentiment_dashboard::sentiment::LexiconClassifier;

const BODY_LIMIT: usize = 1024 * 1024;

struct CannedFetcher(Source, Vec<Item>);

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn fetch(&self, _keyword: &str, limit: usize) -> anyhow::Result<Vec<Item>> {
        Ok(self.1.iter().take(limit).cloned().collect())
    }
    fn source(&self) -> Source {
        self.0
    }
    fn is_configured(&self) -> bool {
        !self.1.is_empty()
    }
}

fn news_item(title: &str, url: &str) -> Item {
    Item {
        text: title.to_string(),
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        published_at: None,
        engagement: None,
    }
}

/// Memory cache, lexicon classifier, canned Twitter and News fetchers, YouTube unconfigured.
fn test_router() -> Router {
    let fetchers: Vec<Arc<dyn Fetcher>> = vec![
        Arc::new(CannedFetcher(
            Source::Twitter,
            vec![
                Item::text("Çok güzel bir gün! #inonu"),
                Item::text("berbat bir maç"),
                Item::text("bugün maç var"),
            ],
        )),
        Arc::new(CannedFetcher(Source::Youtube, vec![])),
        Arc::new(CannedFetcher(
            Source::News,
            vec![
                news_item("Borsa güçlü yükseldi", "https://example.com/1"),
                news_item("Piyasalarda kötü gün", "https://example.com/2"),
            ],
        )),
    ];
    let pipeline = Pipeline::new(
        Arc::new(MemoryCache::new()),
        fetchers,
        Arc::new(LexiconClassifier::new()),
        PipelineConfig::default(),
    );
    create_router(AppState::new(pipeline, 8))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let ctype = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes, ctype)
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET")
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router();
    let (status, body, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn sources_report_configuration_and_limits() {
    let app = test_router();
    let (status, body, _) = send(&app, get("/api/sources")).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();

    let sources = v["sources"].as_array().expect("sources array");
    assert_eq!(sources.len(), 3);
    let youtube = sources.iter().find(|s| s["id"] == "youtube").unwrap();
    assert_eq!(youtube["configured"], false);
    let twitter = sources.iter().find(|s| s["id"] == "twitter").unwrap();
    assert_eq!(twitter["configured"], true);

    assert_eq!(v["limits"]["min"], 10);
    assert_eq!(v["limits"]["max"], 100);
    assert_eq!(v["limits"]["default"], 30);
    assert_eq!(v["classifier"], "lexicon");
    assert_eq!(v["cache"], "memory");
}

#[tokio::test]
async fn analyze_before_fetch_is_no_data() {
    let app = test_router();
    let (status, body, _) = send(
        &app,
        post_json("/api/analyze", json!({"source": "twitter", "keyword": "inonu"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["state"], "no_data");
    assert!(v["error"].as_str().unwrap().contains("twitter:inonu"));
}

#[tokio::test]
async fn fetch_analyze_export_flow() {
    let app = test_router();

    let (status, body, _) = send(
        &app,
        post_json(
            "/api/fetch",
            json!({"source": "twitter", "keyword": "inonu", "limit": 10}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["origin"], "upstream");
    assert_eq!(v["items"].as_array().unwrap().len(), 3);

    let (_, body, _) = send(&app, get("/api/cached?source=twitter&keyword=inonu")).await;
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["count"], 3);

    let (status, body, _) = send(
        &app,
        post_json("/api/analyze", json!({"source": "twitter", "keyword": "inonu"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let total = v["counts"]["total"].as_u64().unwrap();
    assert_eq!(total, 3);
    let sum = v["counts"]["negative"].as_u64().unwrap()
        + v["counts"]["neutral"].as_u64().unwrap()
        + v["counts"]["positive"].as_u64().unwrap();
    assert_eq!(sum, total);
    assert_eq!(v["results"][0]["label"], "positive");
    assert_eq!(v["results"][0]["clean"], "çok güzel bir gün inonu");
    assert!(v["chart"]["svg"].as_str().unwrap().starts_with("<svg"));
    assert_eq!(v["stage"], "rendered");

    let (status, body, ctype) = send(&app, get("/api/export/csv?source=twitter&keyword=inonu")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ctype.unwrap().starts_with("text/csv"));
    let text = String::from_utf8(body).unwrap();
    assert_eq!(text.lines().count() as u64, total + 1);
    assert_eq!(text.lines().next(), Some("text,clean,label"));

    let (status, body, ctype) =
        send(&app, get("/api/export/xlsx?source=twitter&keyword=inonu")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ctype.unwrap().contains("spreadsheetml"));
    assert!(body.starts_with(b"PK"));
}

#[tokio::test]
async fn news_export_uses_title_and_url_columns() {
    let app = test_router();
    send(
        &app,
        post_json("/api/fetch", json!({"source": "news", "keyword": "borsa"})),
    )
    .await;
    let (status, _, _) = send(
        &app,
        post_json("/api/analyze", json!({"source": "news", "keyword": "borsa"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body, _) = send(&app, get("/api/export/csv?source=news&keyword=borsa")).await;
    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "title,url,label");
    assert!(lines[1].starts_with("Borsa güçlü yükseldi,https://example.com/1,"));
}

#[tokio::test]
async fn unconfigured_source_fetch_is_empty_with_warning() {
    let app = test_router();
    let (status, body, _) = send(
        &app,
        post_json("/api/fetch", json!({"source": "youtube", "keyword": "inonu"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert!(v["items"].as_array().unwrap().is_empty());
    assert!(v["warning"].is_string());
}

#[tokio::test]
async fn export_before_analyze_is_404() {
    let app = test_router();
    let (status, body, _) = send(&app, get("/api/export/csv?source=news&keyword=x")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["state"], "no_report");
}

#[tokio::test]
async fn bad_input_is_400() {
    let app = test_router();
    let (status, body, _) = send(
        &app,
        post_json("/api/fetch", json!({"source": "myspace", "keyword": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["state"], "invalid_input");

    let (status, _, _) = send(
        &app,
        post_json("/api/analyze", json!({"source": "news", "keyword": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_body_and_query_are_json_400() {
    let app = test_router();

    let (status, body, ctype) =
        send(&app, post_json("/api/fetch", json!({"source": "twitter"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(ctype.unwrap().starts_with("application/json"));
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["state"], "invalid_input");
    assert!(v["error"].as_str().unwrap().contains("keyword"));

    let req = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("build POST");
    let (status, body, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["state"], "invalid_input");

    for uri in ["/api/cached?source=twitter", "/api/export/csv?keyword=x"] {
        let (status, body, _) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let v: Json = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["state"], "invalid_input", "{uri}");
    }
}
