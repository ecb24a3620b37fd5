//! types.rs: typed records produced by the text parsers and consumed by the
//! dashboard API, the trend heuristics and the report writer.
//!
//! JSON field names stay camelCase so the dashboard front-end reads them as-is.

use serde::{Deserialize, Serialize};

/// Corporate-filing summary. Every field holds the last raw line that mentioned
/// its keyword (or stays empty); nothing numeric is extracted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DartSummary {
    pub revenue: String,
    pub operating_income: String,
    pub capex: String,
    pub headcount: String,
    pub treasury: String,
}

/// One news headline. `time` is empty for formats that do not carry one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub time: String,
    pub source: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-text tag from the legacy format (e.g. "(긍정)"), passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// Forum sentiment class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Fixed sentiment words used in forum drops.
    pub const POSITIVE_TAG: &'static str = "긍정";
    pub const NEUTRAL_TAG: &'static str = "중립";
    pub const NEGATIVE_TAG: &'static str = "부정";

    /// Map a tag word to its class. Total over the three known words.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            Self::POSITIVE_TAG => Some(Self::Positive),
            Self::NEUTRAL_TAG => Some(Self::Neutral),
            Self::NEGATIVE_TAG => Some(Self::Negative),
            _ => None,
        }
    }

    #[inline]
    pub fn score(self) -> i32 {
        match self {
            Self::Positive => 1,
            Self::Neutral => 0,
            Self::Negative => -1,
        }
    }
}

/// One forum post with its sentiment class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumItem {
    pub platform: String,
    pub content: String,
    pub sentiment: Sentiment,
    /// Always `sentiment.score()`; kept as a field for the JSON shape.
    pub score: i32,
}

impl ForumItem {
    pub fn new(platform: impl Into<String>, content: impl Into<String>, sentiment: Sentiment) -> Self {
        Self {
            platform: platform.into(),
            content: content.into(),
            sentiment,
            score: sentiment.score(),
        }
    }
}

/// End-of-day (or realtime) quote for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub ticker: String,
    pub price: i64,
    pub change: i64,
    pub change_percent: f64,
    pub volume: String,
}

impl MarketQuote {
    /// Build a quote whose absolute change is derived from the percentage.
    pub fn derived(ticker: impl Into<String>, price: i64, change_percent: f64, volume: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            price,
            change: derive_change(price, change_percent),
            change_percent,
            volume: volume.into(),
        }
    }
}

/// `round(price * pct / 100)` with halves rounded toward +inf.
pub fn derive_change(price: i64, change_percent: f64) -> i64 {
    let raw = price as f64 * change_percent / 100.0;
    (raw + 0.5).floor() as i64
}

/// Direction of the short-term call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Neutral,
    Down,
}

impl Direction {
    /// Korean label used in reports.
    pub fn label_ko(self) -> &'static str {
        match self {
            Self::Up => "상승",
            Self::Down => "하락",
            Self::Neutral => "보합",
        }
    }
}

/// Rule-based next-day call used by the report generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPrediction {
    pub direction: Direction,
    /// Integer percentage.
    pub confidence: u8,
    /// At most three reasons, in order.
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl TrendPrediction {
    pub fn new(direction: Direction, confidence: u8) -> Self {
        Self {
            direction,
            confidence,
            reasons: Vec::new(),
        }
    }
}

/// Report file listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub date: String,
    pub filename: String,
    pub kind: String,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_score_is_fixed_per_class() {
        assert_eq!(Sentiment::Positive.score(), 1);
        assert_eq!(Sentiment::Neutral.score(), 0);
        assert_eq!(Sentiment::Negative.score(), -1);
        assert_eq!(Sentiment::from_tag("부정"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_tag("모름"), None);
    }

    #[test]
    fn derived_change_rounds_half_up() {
        assert_eq!(derive_change(36_500, 0.8), 292);
        assert_eq!(derive_change(1_000, -0.05), 0); // -0.5 -> 0
        assert_eq!(derive_change(1_000, 0.05), 1); // 0.5 -> 1
        assert_eq!(derive_change(9_850, -1.2), -118);
    }

    #[test]
    fn market_quote_serializes_camel_case() {
        let q = MarketQuote::derived("KT", 36_500, 0.8, "거래량 2.1M");
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["changePercent"], serde_json::json!(0.8));
        assert_eq!(v["change"], serde_json::json!(292));
    }

    #[test]
    fn news_item_omits_absent_optionals() {
        let n = NewsItem {
            time: "09:10".into(),
            source: "연합뉴스".into(),
            title: "제목".into(),
            url: None,
            sentiment: None,
        };
        let v = serde_json::to_value(&n).unwrap();
        assert!(v.get("url").is_none());
        assert!(v.get("sentiment").is_none());
    }
}
