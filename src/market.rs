//! # Market-data feed
//! Realtime quotes and daily close history for the tracked telecom tickers.
//!
//! `NaverFeed` talks to the public Naver Finance endpoints; the payload
//! handling lives in free functions so it can be tested without a network.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use futures_util::future::try_join_all;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::MarketQuote;

/// Ticker → KRX listing code.
pub const KRX_CODES: &[(&str, &str)] = &[("KT", "030200"), ("SKT", "017670"), ("LG", "032640")];

pub const DEFAULT_RANGE: &str = "1mo";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*\]").expect("trailing comma regex"));

pub fn krx_code(ticker: &str) -> Option<&'static str> {
    KRX_CODES.iter().find(|(t, _)| *t == ticker).map(|(_, c)| *c)
}

/// Requested tickers that have a KRX code, in request order.
pub fn known_tickers(tickers: &[String]) -> Vec<String> {
    tickers.iter().filter(|t| krx_code(t).is_some()).cloned().collect()
}

/// One trading day; closes keyed by ticker, flattened on the wire
/// (`{"date":"2025-10-16","KT":36500,"SKT":52100}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    #[serde(flatten)]
    pub closes: BTreeMap<String, f64>,
}

#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn fetch_realtime(&self, tickers: &[String]) -> Result<Vec<MarketQuote>>;
    async fn fetch_daily_history(&self, tickers: &[String], range: &str) -> Result<Vec<DailyPoint>>;
}

// ---------- payload handling ----------

fn num(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Integer volume with thousands separators (`1234567` → `1,234,567`).
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn volume_text(raw: &Value) -> String {
    let v = ["aq", "tv", "at"].iter().find_map(|k| raw.get(*k).filter(|v| !v.is_null()));
    match v {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => group_thousands(i),
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "0".to_string(),
    }
}

/// Normalise a realtime polling payload into quotes for `tickers`, in request
/// order. Entries for codes that were not requested are dropped.
pub fn normalize_realtime(payload: &Value, tickers: &[String]) -> Vec<MarketQuote> {
    let code_to_ticker: HashMap<&str, &str> = tickers
        .iter()
        .filter_map(|t| krx_code(t).map(|c| (c, t.as_str())))
        .collect();

    let datas = payload
        .pointer("/result/areas/0/datas")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut quotes: Vec<MarketQuote> = datas
        .iter()
        .filter_map(|raw| {
            let code = raw.get("cd")?.as_str()?;
            let ticker = code_to_ticker.get(code)?;
            Some(MarketQuote {
                ticker: ticker.to_string(),
                price: num(raw.get("nv")).round() as i64,
                change: num(raw.get("cv")).round() as i64,
                change_percent: num(raw.get("cr")),
                volume: volume_text(raw),
            })
        })
        .collect();

    let order = |t: &str| tickers.iter().position(|x| x == t).unwrap_or(usize::MAX);
    quotes.sort_by_key(|q| order(&q.ticker));
    quotes
}

fn sanitize_sise(s: &str) -> String {
    let flat: String = s.chars().filter(|c| !matches!(c, '\r' | '\n' | '\t')).collect();
    RE_TRAILING_COMMA.replace_all(&flat.replace('\'', "\""), "]").into_owned()
}

/// Parse the loosely-JSON `siseJson` body: strict first, then with quotes and
/// trailing commas fixed, then only the outermost bracketed slice.
pub fn parse_sise_json(raw: &str) -> Result<Vec<Value>> {
    if let Ok(Value::Array(rows)) = serde_json::from_str(raw) {
        return Ok(rows);
    }
    if let Ok(Value::Array(rows)) = serde_json::from_str(&sanitize_sise(raw)) {
        return Ok(rows);
    }
    if let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) {
        if end > start {
            if let Ok(Value::Array(rows)) = serde_json::from_str(&sanitize_sise(&raw[start..=end])) {
                return Ok(rows);
            }
        }
    }
    Err(anyhow!("failed to parse siseJson response"))
}

/// `(date, close)` pairs from parsed siseJson rows. The first row is the header.
pub fn daily_closes(rows: &[Value]) -> Vec<(String, f64)> {
    rows.iter()
        .skip(1)
        .filter_map(|row| {
            let row = row.as_array()?;
            let date = match row.first()? {
                Value::String(s) if !s.is_empty() => s.replace('.', "-"),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let close = match row.get(4)? {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            (close.is_finite() && close != 0.0).then_some((date, close))
        })
        .collect()
}

/// Merge per-ticker series into date-sorted points.
pub fn merge_daily(series: &[(String, Vec<(String, f64)>)]) -> Vec<DailyPoint> {
    let dates: BTreeSet<&str> = series
        .iter()
        .flat_map(|(_, pairs)| pairs.iter().map(|(d, _)| d.as_str()))
        .collect();

    let by_ticker: Vec<(&str, HashMap<&str, f64>)> = series
        .iter()
        .map(|(t, pairs)| (t.as_str(), pairs.iter().map(|(d, c)| (d.as_str(), *c)).collect()))
        .collect();

    dates
        .into_iter()
        .map(|date| DailyPoint {
            date: date.to_string(),
            closes: by_ticker
                .iter()
                .filter_map(|(t, m)| m.get(date).map(|c| (t.to_string(), *c)))
                .collect(),
        })
        .collect()
}

/// Closes for one ticker, oldest first.
pub fn closes_for(points: &[DailyPoint], ticker: &str) -> Vec<f64> {
    points.iter().filter_map(|p| p.closes.get(ticker).copied()).collect()
}

/// Start of a history window ending at `today`. Unknown ranges mean one month.
pub fn range_start(range: &str, today: NaiveDate) -> NaiveDate {
    let months = match range.to_ascii_lowercase().as_str() {
        "3mo" => 3,
        "6mo" => 6,
        "1y" | "12mo" => 12,
        "2y" => 24,
        "5y" => 60,
        _ => 1,
    };
    today.checked_sub_months(Months::new(months)).unwrap_or(today)
}

// ---------- feeds ----------

#[derive(Clone)]
pub struct NaverFeed {
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl Default for NaverFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl NaverFeed {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn get_text(&self, url: &str, referer: &str) -> Result<String> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .get(url)
                .timeout(self.timeout)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "application/json, text/plain, */*")
                .header("Referer", referer)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(rsp) => return rsp.text().await.context("reading market response body"),
                    Err(e) => anyhow!("market HTTP error: {e}"),
                },
                Err(e) => anyhow!("market request failed: {e}"),
            };
            if attempt >= self.max_retries {
                counter!("market_fetch_errors_total").increment(1);
                tracing::warn!(target: "market", url, attempt, error = %err, "market fetch gave up");
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(300u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait]
impl MarketFeed for NaverFeed {
    async fn fetch_realtime(&self, tickers: &[String]) -> Result<Vec<MarketQuote>> {
        let wanted = known_tickers(tickers);
        let codes: Vec<&str> = wanted.iter().filter_map(|t| krx_code(t)).collect();
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "https://polling.finance.naver.com/api/realtime?query=SERVICE_ITEM:{}",
            codes.join(",")
        );
        let body = self.get_text(&url, "https://finance.naver.com/").await?;
        let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let quotes = normalize_realtime(&payload, &wanted);
        tracing::debug!(target: "market", requested = wanted.len(), received = quotes.len(), "realtime quotes");
        Ok(quotes)
    }

    async fn fetch_daily_history(&self, tickers: &[String], range: &str) -> Result<Vec<DailyPoint>> {
        let wanted = known_tickers(tickers);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let today = chrono::Local::now().date_naive();
        let start = range_start(range, today).format("%Y%m%d").to_string();
        let end = today.format("%Y%m%d").to_string();
        let (start, end) = (start.as_str(), end.as_str());

        // one request per ticker, all in flight; any failure fails the batch
        let fetches = wanted.iter().map(|ticker| async move {
            let code = krx_code(ticker).unwrap_or_default();
            let url = format!(
                "https://api.finance.naver.com/siseJson.naver?symbol={code}&requestType=1&startTime={start}&endTime={end}&timeframe=day"
            );
            let body = self.get_text(&url, "https://finance.naver.com").await?;
            let rows = parse_sise_json(&body).with_context(|| format!("daily history for {ticker}"))?;
            Ok::<_, anyhow::Error>((ticker.clone(), daily_closes(&rows)))
        });
        let series = try_join_all(fetches).await?;
        Ok(merge_daily(&series))
    }
}

/// Feed used when outbound market access is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFeed;

#[async_trait]
impl MarketFeed for DisabledFeed {
    async fn fetch_realtime(&self, _tickers: &[String]) -> Result<Vec<MarketQuote>> {
        Err(anyhow!("market feed disabled"))
    }

    async fn fetch_daily_history(&self, _tickers: &[String], _range: &str) -> Result<Vec<DailyPoint>> {
        Err(anyhow!("market feed disabled"))
    }
}

/// In-memory feed with fixed quotes and history; `range` is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    pub quotes: Vec<MarketQuote>,
    pub history: Vec<DailyPoint>,
}

#[async_trait]
impl MarketFeed for StaticFeed {
    async fn fetch_realtime(&self, tickers: &[String]) -> Result<Vec<MarketQuote>> {
        Ok(tickers
            .iter()
            .filter_map(|t| self.quotes.iter().find(|q| &q.ticker == t).cloned())
            .collect())
    }

    async fn fetch_daily_history(&self, tickers: &[String], _range: &str) -> Result<Vec<DailyPoint>> {
        Ok(self
            .history
            .iter()
            .map(|p| DailyPoint {
                date: p.date.clone(),
                closes: p
                    .closes
                    .iter()
                    .filter(|(t, _)| tickers.contains(t))
                    .map(|(t, c)| (t.clone(), *c))
                    .collect(),
            })
            .filter(|p| !p.closes.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn realtime_is_filtered_and_request_ordered() {
        let payload = json!({"result": {"areas": [{"datas": [
            {"cd": "017670", "nv": 52100, "cv": -300, "cr": -0.57, "aq": 1234567},
            {"cd": "030200", "nv": "36500", "cv": 300, "cr": 0.83, "tv": "2.1M"},
            {"cd": "999999", "nv": 1}
        ]}]}});
        let q = normalize_realtime(&payload, &t(&["KT", "SKT"]));
        assert_eq!(q.len(), 2);
        assert_eq!(q[0].ticker, "KT");
        assert_eq!(q[0].price, 36_500);
        assert_eq!(q[0].volume, "2.1M");
        assert_eq!(q[1].ticker, "SKT");
        assert_eq!(q[1].change, -300);
        assert_eq!(q[1].volume, "1,234,567");
    }

    #[test]
    fn non_numeric_fields_become_zero() {
        let payload = json!({"result": {"areas": [{"datas": [{"cd": "030200", "nv": "n/a", "cr": null}]}]}});
        let q = normalize_realtime(&payload, &t(&["KT"]));
        assert_eq!(q[0].price, 0);
        assert_eq!(q[0].change_percent, 0.0);
        assert_eq!(q[0].volume, "0");
        assert!(normalize_realtime(&json!({}), &t(&["KT"])).is_empty());
    }

    #[test]
    fn sise_body_with_single_quotes_and_trailing_comma() {
        let raw = "\n[['날짜', '시가', '고가', '저가', '종가', '거래량'],\n['20251015', 36000, 36800, 35900, 36500, 1000],\n['2025.10.16', 36500, 37000, 36200, 36900, 1200],\n]\n";
        let rows = parse_sise_json(raw).unwrap();
        let closes = daily_closes(&rows);
        assert_eq!(closes, vec![("20251015".to_string(), 36_500.0), ("2025-10-16".to_string(), 36_900.0)]);
        assert!(parse_sise_json("not json").is_err());
    }

    #[test]
    fn merge_unions_dates_in_order() {
        let merged = merge_daily(&[
            ("KT".into(), vec![("2025-10-02".into(), 2.0), ("2025-10-01".into(), 1.0)]),
            ("SKT".into(), vec![("2025-10-02".into(), 20.0), ("2025-10-03".into(), 30.0)]),
        ]);
        let dates: Vec<_> = merged.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, ["2025-10-01", "2025-10-02", "2025-10-03"]);
        assert_eq!(merged[1].closes.len(), 2);
        assert_eq!(closes_for(&merged, "KT"), vec![1.0, 2.0]);

        let v = serde_json::to_value(&merged[0]).unwrap();
        assert_eq!(v, json!({"date": "2025-10-01", "KT": 1.0}));
    }

    #[test]
    fn range_start_table() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 16).unwrap();
        assert_eq!(range_start("1mo", today), NaiveDate::from_ymd_opt(2025, 9, 16).unwrap());
        assert_eq!(range_start("12mo", today), NaiveDate::from_ymd_opt(2024, 10, 16).unwrap());
        assert_eq!(range_start("5Y", today), NaiveDate::from_ymd_opt(2020, 10, 16).unwrap());
        assert_eq!(range_start("weird", today), NaiveDate::from_ymd_opt(2025, 9, 16).unwrap());
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1234567), "-1,234,567");
    }

    #[tokio::test]
    async fn disabled_feed_errors() {
        assert!(DisabledFeed.fetch_realtime(&t(&["KT"])).await.is_err());
    }
}
