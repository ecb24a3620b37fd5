//! # HTTP API
//! JSON surface for the dashboard, upload form, report viewer and the
//! personal-finance page. Handlers stay thin: storage, parsing, caching and
//! the feed do the work.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tower_http::cors::CorsLayer;

use crate::aggregate::{aggregate, ParsedData, ParsedRecords, SourceKind};
use crate::bootstrap::{bootstrap_today, today_kst};
use crate::cache::{key_for_date, ParsedCache};
use crate::config::{law::LawConfig, MarketFeedKind, MonitorConfig};
use crate::finance::{
    break_even, contribution_tax_sim, esop_projection, load_holdings, load_salary, suggest_next_month_price,
    tax_scenarios, withdrawal_sim, ESOP_MONTHS,
};
use crate::market::{closes_for, DisabledFeed, MarketFeed, NaverFeed, DEFAULT_RANGE};
use crate::metrics::Metrics;
use crate::news::{collect_news, DisabledNews, NewsCollector, RssNewsCollector};
use crate::parse::market::find_quote;
use crate::parse::non_blank_lines;
use crate::report::{generate_reports, report_metadata, ReportKind};
use crate::storage::{sanitize_date, sanitize_filename, DataStore, StorageError};
use crate::trend::{generate_trend_prediction_for, project_next_close};

/// History window used for projections and the withdrawal average.
const PROJECTION_RANGE: &str = "3mo";

#[derive(Clone)]
pub struct AppState {
    pub store: DataStore,
    pub cache: Arc<ParsedCache>,
    pub config: Arc<MonitorConfig>,
    pub feed: Arc<dyn MarketFeed>,
    pub news: Arc<dyn NewsCollector>,
}

impl AppState {
    pub fn new(config: MonitorConfig, feed: Arc<dyn MarketFeed>) -> Self {
        Self {
            store: DataStore::new(config.data_root.clone(), config.report_root.clone()),
            cache: Arc::new(ParsedCache::new(config.cache_ttl())),
            config: Arc::new(config),
            feed,
            news: Arc::new(DisabledNews),
        }
    }

    pub fn with_news(mut self, news: Arc<dyn NewsCollector>) -> Self {
        self.news = news;
        self
    }

    /// Pick the feeds named by `config.market_feed`; `off` also disables news collection.
    pub fn from_config(config: MonitorConfig) -> Self {
        match config.market_feed {
            MarketFeedKind::Naver => {
                Self::new(config, Arc::new(NaverFeed::new())).with_news(Arc::new(RssNewsCollector::new()))
            }
            MarketFeedKind::Off => Self::new(config, Arc::new(DisabledFeed)),
        }
    }

    fn law(&self) -> LawConfig {
        LawConfig::load_from_dir(&self.config.law_dir())
    }
}

pub fn router(state: AppState) -> Router {
    let metrics = Metrics::init(state.config.cache_ttl_secs);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/dates", get(list_dates))
        .route("/api/data", get(get_data))
        .route("/api/upload", post(upload))
        .route("/api/news", get(latest_news))
        .route("/api/bootstrap", post(init_sample_data))
        .route("/api/init", get(init_sample_data))
        .route("/api/refresh-cache", post(refresh_cache))
        .route("/api/report", get(list_reports))
        .route("/api/report/generate", post(generate))
        .route("/api/report/content", get(report_content))
        .route("/api/market", get(market_realtime))
        .route("/api/market/history", get(market_history))
        .route("/api/prediction", get(prediction))
        .route("/api/law", get(law))
        .route("/api/my/holdings", get(my_holdings))
        .route("/api/my/salary", get(my_salary))
        .route("/api/my/simulate", post(my_simulate))
        .merge(metrics.router::<AppState>())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---------- errors ----------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidDate(_) | StorageError::InvalidFilename(_) => Self::bad_request(e.to_string()),
            StorageError::Io(_) => {
                tracing::warn!(target: "api", error = %e, "storage failure");
                Self::internal("storage failure")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn required(v: Option<String>, what: &str) -> ApiResult<String> {
    v.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{what} parameter required")))
}

/// `"kt, skt"` → `["KT", "SKT"]`.
fn ticker_list(param: &str) -> Vec<String> {
    param
        .split(',')
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Short stable id for logging uploaded text without its content.
fn anon_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

// ---------- data ----------

async fn list_dates(State(st): State<AppState>) -> ApiResult<Response> {
    let dates = st.store.list_dates().await?;
    Ok(Json(json!({ "dates": dates })).into_response())
}

/// Cached aggregate for `date`, building and caching it on a miss.
async fn load_parsed(st: &AppState, date: &str) -> ApiResult<Arc<ParsedData>> {
    let key = key_for_date(date);
    if let Some(hit) = st.cache.get(&key) {
        return Ok(hit);
    }
    let files = st.store.load_date_files(date).await?;
    Ok(st.cache.set(key, aggregate(date, &files)))
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

async fn get_data(State(st): State<AppState>, Query(q): Query<DateQuery>) -> ApiResult<Response> {
    let date = required(q.date, "Date")?;
    sanitize_date(&date)?;
    let data = load_parsed(&st, &date).await?;
    Ok(Json(data.as_ref()).into_response())
}

#[derive(Deserialize)]
struct UploadQuery {
    date: Option<String>,
    source: Option<String>,
}

async fn upload(State(st): State<AppState>, Query(q): Query<UploadQuery>, body: String) -> ApiResult<Response> {
    let (date, source) = match (required(q.date, "Date"), required(q.source, "Source")) {
        (Ok(date), Ok(source)) => (date, source),
        _ => return Err(ApiError::bad_request("Date and source parameters required")),
    };
    if body.trim().is_empty() {
        return Err(ApiError::bad_request("Content cannot be empty"));
    }

    let source = sanitize_filename(&source)?;
    let filename = st.store.write_source_file(&date, &format!("{source}.txt"), &body).await?;
    let preview = ParsedRecords::parse(SourceKind::from_basename(&source), &body);
    let cleared = st.cache.clear();

    counter!("uploads_total").increment(1);
    tracing::info!(
        target: "api",
        date = %date,
        source = %source,
        id = %anon_id(&body),
        lines = non_blank_lines(&body).count(),
        cleared,
        "upload accepted"
    );

    Ok(Json(json!({
        "success": true,
        "date": date,
        "source": source,
        "filename": filename,
        "preview": preview,
    }))
    .into_response())
}

async fn refresh_cache(State(st): State<AppState>) -> Json<serde_json::Value> {
    let cleared = st.cache.clear();
    let remaining = st.cache.stats().size;
    tracing::info!(target: "cache", cleared, "cache refreshed");
    Json(json!({ "success": true, "cleared": cleared, "remaining": remaining }))
}

// ---------- collection ----------

async fn latest_news(State(st): State<AppState>) -> ApiResult<Response> {
    let date = today_kst().format("%Y-%m-%d").to_string();
    let collection = collect_news(&st.store, &*st.news, &date, Utc::now())
        .await
        .map_err(|e| {
            tracing::warn!(target: "news", error = %e, "news collection not stored");
            ApiError::bad_gateway("Failed to fetch news")
        })?;
    if !collection.cached {
        st.cache.clear();
    }
    Ok(Json(collection).into_response())
}

/// Seed today's sample data unless today already has data.
async fn init_sample_data(State(st): State<AppState>) -> ApiResult<Response> {
    let seeded = bootstrap_today(&st.store).await.map_err(|e| {
        tracing::warn!(target: "storage", error = %e, "bootstrap failed");
        ApiError::internal("Failed to initialize")
    })?;
    if seeded {
        st.cache.clear();
    }
    let message = if seeded { "Data initialized" } else { "Already initialized" };
    Ok(Json(json!({ "success": true, "message": message })).into_response())
}

// ---------- reports ----------

async fn list_reports(State(st): State<AppState>, Query(q): Query<DateQuery>) -> ApiResult<Response> {
    let date = required(q.date, "Date")?;
    let reports: Vec<_> = st
        .store
        .list_reports(&date)
        .await?
        .iter()
        .map(|f| report_metadata(&date, f))
        .collect();
    Ok(Json(json!({ "reports": reports })).into_response())
}

#[derive(Deserialize)]
struct GenerateReq {
    date: Option<String>,
    kinds: Option<Vec<String>>,
}

async fn generate(State(st): State<AppState>, Json(req): Json<GenerateReq>) -> ApiResult<Response> {
    let (Some(date), Some(kinds)) = (req.date, req.kinds) else {
        return Err(ApiError::bad_request("Date and kinds array required"));
    };
    let kinds: Vec<ReportKind> = kinds.iter().filter_map(|k| ReportKind::parse(k)).collect();
    let generated = generate_reports(&st.store, &date, &kinds).await?;
    Ok(Json(json!({ "success": true, "date": date, "generated": generated })).into_response())
}

#[derive(Deserialize)]
struct ContentQuery {
    date: Option<String>,
    filename: Option<String>,
}

async fn report_content(State(st): State<AppState>, Query(q): Query<ContentQuery>) -> ApiResult<Response> {
    let (Some(date), Some(filename)) = (q.date, q.filename) else {
        return Err(ApiError::bad_request("Date and filename parameters required"));
    };
    let content = st.store.read_report(&date, &filename).await?;
    if content.is_empty() {
        return Err(ApiError::not_found("Report not found"));
    }
    Ok(Json(json!({ "content": content })).into_response())
}

// ---------- market ----------

#[derive(Deserialize)]
struct MarketQuery {
    tickers: Option<String>,
    range: Option<String>,
}

async fn market_realtime(State(st): State<AppState>, Query(q): Query<MarketQuery>) -> ApiResult<Response> {
    let feed_err = |e: anyhow::Error| {
        tracing::warn!(target: "market", error = %e, "realtime fetch failed");
        ApiError::bad_gateway("Failed to fetch realtime market")
    };

    match q.tickers.as_deref() {
        Some(param) => {
            let list = st.feed.fetch_realtime(&ticker_list(param)).await.map_err(feed_err)?;
            Ok(Json(json!({ "data": list })).into_response())
        }
        None => {
            let primary = st.config.primary_ticker.clone();
            let list = st
                .feed
                .fetch_realtime(std::slice::from_ref(&primary))
                .await
                .map_err(feed_err)?;
            Ok(Json(json!({ "data": list.first(), "ticker": primary })).into_response())
        }
    }
}

async fn market_history(State(st): State<AppState>, Query(q): Query<MarketQuery>) -> ApiResult<Response> {
    let tickers = match q.tickers.as_deref() {
        Some(p) => ticker_list(p),
        None => st.config.tickers.clone(),
    };
    let range = q.range.as_deref().unwrap_or(DEFAULT_RANGE);
    let data = st.feed.fetch_daily_history(&tickers, range).await.map_err(|e| {
        tracing::warn!(target: "market", error = %e, "history fetch failed");
        ApiError::bad_gateway("Failed to fetch history")
    })?;
    Ok(Json(json!({ "data": data })).into_response())
}

/// Primary-ticker closes, oldest first; empty when the feed is unavailable.
async fn primary_closes(st: &AppState) -> Vec<f64> {
    let primary = &st.config.primary_ticker;
    match st
        .feed
        .fetch_daily_history(std::slice::from_ref(primary), PROJECTION_RANGE)
        .await
    {
        Ok(points) => closes_for(&points, primary),
        Err(e) => {
            tracing::debug!(target: "market", error = %e, "no history for projection");
            Vec::new()
        }
    }
}

async fn prediction(State(st): State<AppState>, Query(q): Query<DateQuery>) -> ApiResult<Response> {
    let date = required(q.date, "Date")?;
    sanitize_date(&date)?;
    let data = load_parsed(&st, &date).await?;
    let trend = generate_trend_prediction_for(&st.config.primary_ticker, data.market(), data.forum());
    let projection = project_next_close(&primary_closes(&st).await);
    Ok(Json(json!({ "date": date, "trend": trend, "projection": projection })).into_response())
}

// ---------- personal finance ----------

async fn law(State(st): State<AppState>) -> Json<LawConfig> {
    Json(st.law())
}

async fn my_holdings(State(st): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "holdings": load_holdings(&st.config.my_dir()).await }))
}

async fn my_salary(State(st): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "months": load_salary(&st.config.my_dir()).await }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateReq {
    withdrawal_date: Option<NaiveDate>,
    market_price: Option<i64>,
    #[serde(default)]
    annual_contribution: u64,
}

async fn my_simulate(State(st): State<AppState>, body: Bytes) -> ApiResult<Json<serde_json::Value>> {
    let req: SimulateReq = if body.iter().all(u8::is_ascii_whitespace) {
        SimulateReq::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(format!("invalid simulate request: {e}")))?
    };
    let law = st.law();
    let my_dir = st.config.my_dir();
    let holdings = load_holdings(&my_dir).await;
    let salary = load_salary(&my_dir).await;
    let closes = primary_closes(&st).await;
    let break_even_price = break_even(&holdings);

    let market_price = match req.market_price {
        Some(p) => p,
        None => {
            let primary = &st.config.primary_ticker;
            let live = st.feed.fetch_realtime(std::slice::from_ref(primary)).await.ok();
            live.as_deref()
                .and_then(|q| find_quote(q, primary))
                .map(|q| q.price)
                .or_else(|| closes.last().map(|c| c.round() as i64))
                .unwrap_or(break_even_price)
        }
    };
    let today = today_kst();
    let withdrawal_date = req.withdrawal_date.unwrap_or(today);

    Ok(Json(json!({
        "marketPrice": market_price,
        "breakEven": break_even_price,
        "suggestedPrice": suggest_next_month_price(&closes),
        "contribution": contribution_tax_sim(&salary, req.annual_contribution, &law),
        "withdrawal": withdrawal_sim(&holdings, withdrawal_date, market_price, &closes, &law),
        "taxScenarios": tax_scenarios(closes.last().copied(), break_even_price, &holdings),
        "esopProjection": esop_projection(&closes, &holdings, req.annual_contribution, ESOP_MONTHS, today),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_list_normalises() {
        assert_eq!(ticker_list(" kt, ,skt "), vec!["KT", "SKT"]);
    }

    #[test]
    fn anon_id_is_short_hex() {
        let id = anon_id("hello");
        assert_eq!(id.len(), 12);
        assert_eq!(id, anon_id("hello"));
        assert_ne!(id, anon_id("hello!"));
    }

    #[test]
    fn storage_errors_map_to_status() {
        let e: ApiError = StorageError::InvalidDate("x".into()).into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        let e: ApiError = StorageError::Io(std::io::Error::other("boom")).into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
