// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot against a
// temporary data tree and an in-memory market feed.
//
// Covered:
// - GET /health, /api/dates, /api/data
// - POST /api/upload (+ cache invalidation, parameter checks), /api/refresh-cache
// - GET /api/news (fixture collector), POST /api/bootstrap, GET /api/init
// - report generate / list / content
// - market realtime + history, prediction, finance simulate
// - /metrics exposition

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use kt_stock_monitor::config::{MarketFeedKind, MonitorConfig};
use kt_stock_monitor::market::{DailyPoint, MarketFeed, StaticFeed};
use kt_stock_monitor::news::FixtureNews;
use kt_stock_monitor::types::MarketQuote;
use kt_stock_monitor::{router, AppState};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const DATE: &str = "2025-10-16";

fn test_config(root: &std::path::Path) -> MonitorConfig {
    MonitorConfig {
        data_root: root.join("data"),
        report_root: root.join("report"),
        market_feed: MarketFeedKind::Off,
        ..MonitorConfig::default()
    }
}

fn static_feed() -> StaticFeed {
    let history = (0..30)
        .map(|i| DailyPoint {
            date: format!("2025-09-{:02}", i + 1),
            closes: BTreeMap::from([("KT".to_string(), 36_000.0 + 10.0 * i as f64)]),
        })
        .collect();
    StaticFeed {
        quotes: vec![
            MarketQuote::derived("KT", 36_500, 0.8, "2,100,000"),
            MarketQuote::derived("SKT", 56_800, 0.4, "1,300,000"),
        ],
        history,
    }
}

/// Router over a fresh temp tree; the TempDir must outlive the router.
fn test_app(feed: Arc<dyn MarketFeed>) -> (tempfile::TempDir, Router) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = AppState::new(test_config(tmp.path()), feed);
    (tmp, router(state))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::get(uri).body(Body::empty()).expect("build GET");
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

async fn post(app: &Router, uri: &str, content_type: &str, body: String) -> (StatusCode, Json) {
    let req = Request::post(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .expect("build POST");
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn health_returns_ok() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, bytes) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "ok");
}

#[tokio::test]
async fn upload_then_data_reflects_new_content() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));

    let (status, v) = post(
        &app,
        &format!("/api/upload?date={DATE}&source=forum"),
        "text/plain",
        "[Blind] 실적 무난 (긍정)".into(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["filename"], "forum.txt");
    assert_eq!(v["preview"][0]["platform"], "Blind");

    let (_, dates) = get_json(&app, "/api/dates").await;
    assert_eq!(dates["dates"], json!([DATE]));

    let (status, data) = get_json(&app, &format!("/api/data?date={DATE}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["sources"]["forum"]["parsed"][0]["score"], 1);

    // second upload must invalidate the cached aggregate
    post(
        &app,
        &format!("/api/upload?date={DATE}&source=forum"),
        "text/plain",
        "[DC] 별로 (부정)".into(),
    )
    .await;
    let (_, data) = get_json(&app, &format!("/api/data?date={DATE}")).await;
    assert_eq!(data["sources"]["forum"]["parsed"][0]["score"], -1);

    let (_, v) = post(&app, "/api/refresh-cache", "application/json", String::new()).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["cleared"], 1);
    assert_eq!(v["remaining"], 0);
}

#[tokio::test]
async fn bad_requests_are_json_errors() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));

    let (status, v) = get_json(&app, "/api/data").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(v["error"].as_str().unwrap().contains("required"));

    let (status, _) = get_json(&app, "/api/data?date=16-10-2025").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, &format!("/api/upload?date={DATE}&source=news"), "text/plain", "  \n".into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, v) = get_json(&app, &format!("/api/report/content?date={DATE}&filename=stock.md")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"], "Report not found");
}

#[tokio::test]
async fn upload_rejects_blank_or_unsafe_parameters() {
    let (tmp, app) = test_app(Arc::new(static_feed()));

    for uri in [
        format!("/api/upload?date={DATE}&source="),
        format!("/api/upload?date={DATE}&source=%20%20"),
        "/api/upload?date=&source=forum".to_string(),
        format!("/api/upload?date={DATE}&source=%2F"),
    ] {
        let (status, v) = post(&app, &uri, "text/plain", "hello".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(v["error"].is_string());
    }
    assert!(!tmp.path().join("data").join(DATE).join(".txt").exists());

    // names come back sanitised
    let (status, v) = post(
        &app,
        &format!("/api/upload?date={DATE}&source=me%20mo"),
        "text/plain",
        "hello".into(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["source"], "memo");
    assert_eq!(v["filename"], "memo.txt");

    let (_, data) = get_json(&app, &format!("/api/data?date={DATE}")).await;
    let keys: Vec<&String> = data["sources"].as_object().unwrap().keys().collect();
    assert_eq!(keys, ["memo"]);
}

#[tokio::test]
async fn report_generate_list_and_read() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));
    post(
        &app,
        &format!("/api/upload?date={DATE}&source=market"),
        "text/plain",
        "KT: 36,500 (-1.2%) | 거래량 2.1M".into(),
    )
    .await;
    post(
        &app,
        &format!("/api/upload?date={DATE}&source=forum"),
        "text/plain",
        "[Blind] 실망 (부정)".into(),
    )
    .await;

    let (status, v) = post(
        &app,
        "/api/report/generate",
        "application/json",
        json!({ "date": DATE, "kinds": ["stock", "weekly", "kt"] }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["generated"], json!(["stock.md", "kt.md"]));

    let (_, v) = get_json(&app, &format!("/api/report?date={DATE}")).await;
    assert_eq!(v["reports"][1]["kind"], "stock");
    assert_eq!(v["reports"][1]["path"], format!("/report/{DATE}/stock.md"));

    let (status, v) = get_json(&app, &format!("/api/report/content?date={DATE}&filename=stock.md")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(v["content"].as_str().unwrap().contains("하락 (신뢰도 70%)"));
}

#[tokio::test]
async fn market_routes_use_the_feed() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));

    let (status, v) = get_json(&app, "/api/market?tickers=skt,kt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"][0]["ticker"], "SKT");
    assert_eq!(v["data"][1]["change"], 292);

    let (_, v) = get_json(&app, "/api/market").await;
    assert_eq!(v["ticker"], "KT");
    assert_eq!(v["data"]["price"], 36_500);

    let (_, v) = get_json(&app, "/api/market/history?tickers=KT&range=1mo").await;
    assert_eq!(v["data"].as_array().unwrap().len(), 30);
    assert_eq!(v["data"][0]["KT"], 36_000.0);
}

#[tokio::test]
async fn disabled_feed_is_bad_gateway() {
    let (_tmp, app) = test_app(Arc::new(kt_stock_monitor::market::DisabledFeed));
    let (status, v) = get_json(&app, "/api/market?tickers=KT").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["error"], "Failed to fetch realtime market");

    // prediction still works, just without a projection
    let (status, v) = get_json(&app, &format!("/api/prediction?date={DATE}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["trend"]["direction"], "neutral");
    assert_eq!(v["trend"]["confidence"], 50);
    assert!(v["projection"].is_null());
}

#[tokio::test]
async fn prediction_combines_both_models() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));
    post(
        &app,
        &format!("/api/upload?date={DATE}&source=market"),
        "text/plain",
        "KT: 36,500 (+0.8%) | 거래량 2.1M".into(),
    )
    .await;
    post(
        &app,
        &format!("/api/upload?date={DATE}&source=forum"),
        "text/plain",
        "[Blind] 좋다 (긍정)".into(),
    )
    .await;

    let (_, v) = get_json(&app, &format!("/api/prediction?date={DATE}")).await;
    assert_eq!(v["trend"]["direction"], "up");
    assert_eq!(v["projection"]["windowSize"], 20);
    assert_eq!(v["projection"]["lastClose"], 36_290.0);
}

#[tokio::test]
async fn finance_routes_with_empty_personal_data() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));

    let (_, v) = get_json(&app, "/api/my/holdings").await;
    assert_eq!(v["holdings"], json!([]));

    let (_, v) = get_json(&app, "/api/law").await;
    assert_eq!(v["withholdingRelief"]["obligationYears"], 2.0);

    let (status, v) = post(&app, "/api/my/simulate", "application/json", String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["marketPrice"], 36_500, "live quote used when no price is given");
    assert_eq!(v["withdrawal"]["totalTax"], 0);

    let bars = v["taxScenarios"].as_array().unwrap();
    assert_eq!(bars.len(), 3);
    assert_eq!(bars[0]["tax"], 220_000, "1M floor at 22%");
    let projection = v["esopProjection"].as_array().unwrap();
    assert_eq!(projection.len(), 60);
    assert_eq!(projection[0]["withoutEsop"], 0);

    let (_, v) = post(
        &app,
        "/api/my/simulate",
        "application/json",
        json!({ "annualContribution": 1_200_000 }).to_string(),
    )
    .await;
    assert_eq!(v["esopProjection"][59]["withoutEsop"], 6_000_000);

    let (status, _) = post(&app, "/api/my/simulate", "application/json", "{not json".into()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

const NEWS_RSS: &str = r#"<rss version="2.0"><channel>
<item><title>KT 배당 확대</title><link>https://news.example/1</link><source url="https://news.example">예시일보</source></item>
</channel></rss>"#;

#[tokio::test]
async fn news_route_collects_then_serves_saved_items() {
    let tmp = tempfile::tempdir().unwrap();
    let state = AppState::new(test_config(tmp.path()), Arc::new(static_feed()))
        .with_news(Arc::new(FixtureNews::from_bodies([NEWS_RSS])));
    let app = router(state);

    let (status, v) = get_json(&app, "/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["cached"], false);
    assert_eq!(v["items"][0]["link"], "https://news.example/1");
    let date = v["date"].as_str().unwrap().to_string();

    let (_, v) = get_json(&app, "/api/news").await;
    assert_eq!(v["cached"], true);
    assert_eq!(v["items"][0]["source"], "예시일보");

    let (_, data) = get_json(&app, &format!("/api/data?date={date}")).await;
    assert_eq!(data["sources"]["news"]["filename"], "new-list.txt");
    assert!(data["sources"].get("news-next").is_none());
}

#[tokio::test]
async fn bootstrap_routes_seed_once() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));

    let (status, v) = post(&app, "/api/bootstrap", "application/json", String::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, json!({ "success": true, "message": "Data initialized" }));

    let (_, v) = get_json(&app, "/api/init").await;
    assert_eq!(v["message"], "Already initialized");

    let (_, dates) = get_json(&app, "/api/dates").await;
    assert_eq!(dates["dates"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let (_tmp, app) = test_app(Arc::new(static_feed()));
    // touch the cache so its counters exist
    get_json(&app, &format!("/api/data?date={DATE}")).await;

    let req = Request::get("/metrics").body(Body::empty()).unwrap();
    let (status, bytes) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    for needle in ["parsed_cache_misses_total", "parsed_cache_ttl_secs"] {
        assert!(text.contains(needle), "metrics output should contain '{needle}'");
    }
}
