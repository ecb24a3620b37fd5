//! # News collector
//! Pulls KT headlines from Google News RSS (Bing News as fallback) and stores
//! them as `new-list.txt`, the linked news drop the aggregator prefers over a
//! plain `news.txt`. A `news-next.txt` stamp holds collection back for an hour.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::aggregate::NEWS_LIST_BASENAME;
use crate::parse::{non_blank_lines, pipe_fields};
use crate::storage::{DataStore, StorageResult, NEWS_COOLDOWN_FILE};

pub const NEWS_QUERIES: &[&str] = &["KT 통신", "KT 주식", "KT corporation"];

/// Items kept per collection.
pub const MAX_ITEMS: usize = 15;

const COOLDOWN_MINUTES: i64 = 60;

const MIRROR_PREFIX: &str = "https://r.jina.ai/";

const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
];

pub fn news_list_file() -> String {
    format!("{NEWS_LIST_BASENAME}.txt")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RssItem {
    pub title: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    pub source: String,
}

#[async_trait]
pub trait NewsCollector: Send + Sync {
    async fn collect(&self) -> Result<Vec<RssItem>>;
}

// ---------- RSS payload ----------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default, rename = "item")]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<SourceTag>,
}

#[derive(Debug, Deserialize)]
struct SourceTag {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&middot;", "·")
        .replace("&hellip;", "…")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

fn is_http(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Host of `link` without a leading `www.`; empty when unparsable.
pub fn domain_from_url(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h).to_string()))
        .unwrap_or_default()
}

/// Unwrap aggregator redirect links to the article URL they carry.
pub fn normalize_aggregator_link(link: &str) -> String {
    let Ok(url) = Url::parse(link) else {
        return link.to_string();
    };
    let host = url.host_str().unwrap_or_default();
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };

    let embedded = if host.contains("news.google.") {
        param("url").or_else(|| param("q"))
    } else if host.contains("bing.com") && url.path().contains("apiclick") {
        param("url")
    } else {
        None
    };
    match embedded {
        Some(e) if is_http(&e) => e,
        _ => link.to_string(),
    }
}

/// Items of one RSS body. Text before `<rss` (mirror preamble) is ignored.
pub fn parse_rss(body: &str) -> Result<Vec<RssItem>> {
    let t0 = std::time::Instant::now();
    let xml = body.find("<rss").map_or(body, |i| &body[i..]);
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml)).context("parsing news rss xml")?;

    let out: Vec<RssItem> = rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| {
            let title = it.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let link = normalize_aggregator_link(it.link.as_deref().unwrap_or_default().trim());
            if link.is_empty() {
                return None;
            }
            let source = it
                .source
                .and_then(|s| s.name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| domain_from_url(&link));
            Some(RssItem {
                title,
                link,
                pub_date: it.pub_date,
                source,
            })
        })
        .collect();

    histogram!("news_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// First item per title, at most `cap`.
pub fn dedup_by_title(items: Vec<RssItem>, cap: usize) -> Vec<RssItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|it| seen.insert(it.title.clone()))
        .take(cap)
        .collect()
}

/// `title | link | source` per line.
pub fn render_news_list(items: &[RssItem]) -> String {
    items
        .iter()
        .map(|n| format!("{} | {} | {}", n.title, n.link, n.source))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Items back from a stored `new-list.txt`; lines with fewer than three fields are skipped.
pub fn read_news_list(raw: &str) -> Vec<RssItem> {
    non_blank_lines(raw)
        .filter_map(|line| match pipe_fields(line).as_slice() {
            [title, link, source, ..] => Some(RssItem {
                title: title.to_string(),
                link: link.to_string(),
                pub_date: None,
                source: source.to_string(),
            }),
            _ => None,
        })
        .collect()
}

// ---------- collectors ----------

#[derive(Debug, Clone, Copy)]
enum Engine {
    Google,
    Bing,
}

impl Engine {
    fn search_url(self, query: &str) -> Result<Url> {
        let url = match self {
            Self::Google => Url::parse_with_params(
                "https://news.google.com/rss/search",
                &[("q", query), ("hl", "ko"), ("gl", "KR"), ("ceid", "KR:ko")],
            ),
            Self::Bing => Url::parse_with_params(
                "https://www.bing.com/news/search",
                &[("q", query), ("setlang", "ko"), ("format", "RSS")],
            ),
        };
        url.context("building news search url")
    }

    fn referer(self) -> &'static str {
        match self {
            Self::Google => "https://news.google.com/",
            Self::Bing => "https://www.bing.com/news",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Bing => "bing",
        }
    }
}

/// Google News RSS first, Bing News RSS when Google yields nothing.
#[derive(Clone)]
pub struct RssNewsCollector {
    client: Client,
    timeout: Duration,
    max_retries: u8,
    mirror_retries: u8,
}

impl Default for RssNewsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RssNewsCollector {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: Duration::from_secs(8),
            max_retries: 3,
            mirror_retries: 2,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn get_text(&self, url: &str, referer: &str, attempt: u8) -> Result<String> {
        let ua = USER_AGENTS[usize::from(attempt) % USER_AGENTS.len()];
        let rsp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header("User-Agent", ua)
            .header("Accept", "application/rss+xml, text/xml;q=0.9, */*;q=0.8")
            .header("Accept-Language", "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7")
            .header("Cache-Control", "no-cache")
            .header("Referer", referer)
            .send()
            .await
            .map_err(|e| anyhow!("news request failed: {e}"))?;
        let rsp = rsp.error_for_status().map_err(|e| anyhow!("news HTTP error: {e}"))?;
        rsp.text().await.context("reading news response body")
    }

    /// Direct attempts with rotating agents, then the mirror.
    async fn fetch_feed(&self, url: &Url, referer: &str) -> Result<String> {
        let direct = url.as_str();
        let mirror = format!("{MIRROR_PREFIX}{direct}");
        let plan = (0..self.max_retries)
            .map(|a| (direct, a))
            .chain((0..self.mirror_retries).map(|a| (mirror.as_str(), a)));

        let mut last = anyhow!("no attempts made");
        for (endpoint, attempt) in plan {
            match self.get_text(endpoint, referer, attempt).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!(target: "news", url = endpoint, attempt, error = %e, "news fetch attempt failed");
                    last = e;
                }
            }
        }
        Err(last)
    }

    async fn search_one(&self, engine: Engine, query: &str) -> Result<Vec<RssItem>> {
        let url = engine.search_url(query)?;
        let body = self.fetch_feed(&url, engine.referer()).await?;
        parse_rss(&body)
    }

    /// Every query against `engine`; failed queries are skipped.
    async fn search(&self, engine: Engine) -> Vec<RssItem> {
        let mut items = Vec::new();
        for &query in NEWS_QUERIES {
            match self.search_one(engine, query).await {
                Ok(found) => items.extend(found),
                Err(e) => {
                    counter!("news_fetch_errors_total").increment(1);
                    tracing::warn!(target: "news", engine = engine.name(), query, error = %e, "news query skipped");
                }
            }
        }
        items
    }
}

#[async_trait]
impl NewsCollector for RssNewsCollector {
    async fn collect(&self) -> Result<Vec<RssItem>> {
        let mut items = self.search(Engine::Google).await;
        if items.is_empty() {
            items = self.search(Engine::Bing).await;
        }
        Ok(dedup_by_title(items, MAX_ITEMS))
    }
}

/// Collector used when outbound access is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNews;

#[async_trait]
impl NewsCollector for DisabledNews {
    async fn collect(&self) -> Result<Vec<RssItem>> {
        Err(anyhow!("news collector disabled"))
    }
}

/// Collector over fixed RSS bodies.
#[derive(Debug, Clone, Default)]
pub struct FixtureNews {
    bodies: Vec<String>,
}

impl FixtureNews {
    pub fn from_bodies<I, S>(bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bodies: bodies.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl NewsCollector for FixtureNews {
    async fn collect(&self) -> Result<Vec<RssItem>> {
        let mut items = Vec::new();
        for body in &self.bodies {
            items.extend(parse_rss(body)?);
        }
        Ok(dedup_by_title(items, MAX_ITEMS))
    }
}

// ---------- collection with cooldown ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsCollection {
    pub date: String,
    pub items: Vec<RssItem>,
    pub cached: bool,
    pub next_at: DateTime<Utc>,
}

async fn next_collect_at(store: &DataStore, date: &str) -> StorageResult<Option<DateTime<Utc>>> {
    let raw = store.read_source_file(date, NEWS_COOLDOWN_FILE).await?;
    Ok(DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc)))
}

/// Saved items while the cooldown for `date` holds, otherwise a fresh
/// collection written to `new-list.txt`. An empty result leaves the
/// previous list in place.
pub async fn collect_news(
    store: &DataStore,
    collector: &dyn NewsCollector,
    date: &str,
    now: DateTime<Utc>,
) -> StorageResult<NewsCollection> {
    let list_file = news_list_file();

    if let Some(next_at) = next_collect_at(store, date).await? {
        if now < next_at {
            let items = read_news_list(&store.read_source_file(date, &list_file).await?);
            tracing::debug!(target: "news", date, saved = items.len(), "news cooldown active");
            return Ok(NewsCollection {
                date: date.to_string(),
                items,
                cached: true,
                next_at,
            });
        }
    }

    let items = collector.collect().await.unwrap_or_else(|e| {
        tracing::warn!(target: "news", date, error = %e, "news collection failed");
        Vec::new()
    });
    if !items.is_empty() {
        store.write_source_file(date, &list_file, &render_news_list(&items)).await?;
    }
    let next_at = now + TimeDelta::minutes(COOLDOWN_MINUTES);
    store
        .write_source_file(date, NEWS_COOLDOWN_FILE, &next_at.to_rfc3339())
        .await?;

    counter!("news_items_collected_total").increment(items.len() as u64);
    tracing::info!(target: "news", date, items = items.len(), "news collected");
    Ok(NewsCollection {
        date: date.to_string(),
        items,
        cached: false,
        next_at,
    })
}
