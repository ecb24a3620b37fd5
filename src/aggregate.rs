//! # Aggregator
//! Turns the `(filename, content)` pairs found for one date into a
//! [`ParsedData`] keyed by logical source name.
//!
//! Source selection is declarative: a [`MergeRule`] names a logical key and its
//! candidate files in priority order, and the first candidate present wins.
//! Files not covered by a rule map 1:1 from basename to key.

use std::collections::HashMap;

use metrics::{counter, histogram};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::parse::{non_blank_lines, parse_dart, parse_forum, parse_market, parse_news};
use crate::types::{DartSummary, ForumItem, MarketQuote, NewsItem};

/// Which parser handles a basename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Dart,
    News,
    Forum,
    Market,
    Custom,
}

impl SourceKind {
    pub fn from_basename(basename: &str) -> Self {
        match basename {
            "dart" => Self::Dart,
            "news" | NEWS_LIST_BASENAME => Self::News,
            "forum" => Self::Forum,
            "market" => Self::Market,
            _ => Self::Custom,
        }
    }
}

/// Basename of the richer news file written by the link-collecting job.
pub const NEWS_LIST_BASENAME: &str = "new-list";

/// Parser output for one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedRecords {
    Dart(DartSummary),
    News(Vec<NewsItem>),
    Forum(Vec<ForumItem>),
    Market(Vec<MarketQuote>),
    Raw { raw: String },
}

impl ParsedRecords {
    /// Dispatch `content` to the parser for `kind`.
    pub fn parse(kind: SourceKind, content: &str) -> Self {
        match kind {
            SourceKind::Dart => Self::Dart(parse_dart(content)),
            SourceKind::News => Self::News(parse_news(content)),
            SourceKind::Forum => Self::Forum(parse_forum(content)),
            SourceKind::Market => Self::Market(parse_market(content)),
            SourceKind::Custom => Self::Raw {
                raw: content.to_string(),
            },
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Dart(_) | Self::Raw { .. } => 1,
            Self::News(v) => v.len(),
            Self::Forum(v) => v.len(),
            Self::Market(v) => v.len(),
        }
    }
}

/// One logical source for a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceData {
    pub filename: String,
    /// Non-blank raw lines, untrimmed.
    pub lines: Vec<String>,
    pub parsed: ParsedRecords,
}

/// Ordered `key -> SourceData` map. Serializes as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap(Vec<(String, SourceData)>);

impl SourceMap {
    pub fn get(&self, key: &str) -> Option<&SourceData> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, key: String, data: SourceData) {
        self.0.push((key, data));
    }
}

impl Serialize for SourceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Everything parsed for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedData {
    pub date: String,
    pub sources: SourceMap,
}

impl ParsedData {
    pub fn news(&self) -> &[NewsItem] {
        match self.sources.get("news").map(|s| &s.parsed) {
            Some(ParsedRecords::News(v)) => v,
            _ => &[],
        }
    }

    pub fn forum(&self) -> &[ForumItem] {
        match self.sources.get("forum").map(|s| &s.parsed) {
            Some(ParsedRecords::Forum(v)) => v,
            _ => &[],
        }
    }

    pub fn market(&self) -> &[MarketQuote] {
        match self.sources.get("market").map(|s| &s.parsed) {
            Some(ParsedRecords::Market(v)) => v,
            _ => &[],
        }
    }

    pub fn dart(&self) -> Option<&DartSummary> {
        match self.sources.get("dart").map(|s| &s.parsed) {
            Some(ParsedRecords::Dart(d)) => Some(d),
            _ => None,
        }
    }
}

/// "Logical key `key` is populated from the first available file among `candidates`."
#[derive(Debug, Clone, Copy)]
pub struct MergeRule {
    pub key: &'static str,
    /// Basenames, highest priority first.
    pub candidates: &'static [&'static str],
}

/// The collected news list (with resolved URLs) beats the plain news drop.
pub const DEFAULT_MERGE_RULES: &[MergeRule] = &[MergeRule {
    key: "news",
    candidates: &[NEWS_LIST_BASENAME, "news"],
}];

fn basename(filename: &str) -> &str {
    filename.strip_suffix(".txt").unwrap_or(filename)
}

fn logical_key<'a>(rules: &[MergeRule], base: &'a str) -> (&'a str, Option<MergeRule>) {
    match rules.iter().find(|r| r.candidates.iter().any(|c| *c == base)) {
        Some(r) => (r.key, Some(*r)),
        None => (base, None),
    }
}

/// Aggregate with [`DEFAULT_MERGE_RULES`].
pub fn aggregate(date: &str, files: &[(String, String)]) -> ParsedData {
    aggregate_with_rules(date, files, DEFAULT_MERGE_RULES)
}

/// Build [`ParsedData`] for `date`. Keys appear in the order their first file
/// was discovered; the file backing a ruled key is chosen by rule priority,
/// never by discovery order.
pub fn aggregate_with_rules(date: &str, files: &[(String, String)], rules: &[MergeRule]) -> ParsedData {
    let t0 = std::time::Instant::now();

    let by_base: HashMap<&str, (&str, &str)> = files
        .iter()
        .map(|(name, content)| (basename(name), (name.as_str(), content.as_str())))
        .collect();

    let mut order: Vec<(&str, Option<MergeRule>)> = Vec::new();
    for (name, _) in files {
        let (key, rule) = logical_key(rules, basename(name));
        if !order.iter().any(|(k, _)| *k == key) {
            order.push((key, rule));
        }
    }

    let mut sources = SourceMap::default();
    for (key, rule) in order {
        let chosen = match rule {
            Some(r) => r.candidates.iter().find_map(|c| by_base.get(*c).map(|f| (*c, *f))),
            None => by_base.get(key).map(|f| (key, *f)),
        };
        let Some((base, (filename, content))) = chosen else {
            continue;
        };

        let parsed = ParsedRecords::parse(SourceKind::from_basename(base), content);
        tracing::debug!(
            target: "aggregate",
            date,
            key,
            filename,
            records = parsed.len(),
            "source parsed"
        );
        sources.push(
            key.to_string(),
            SourceData {
                filename: filename.to_string(),
                lines: non_blank_lines(content).map(str::to_string).collect(),
                parsed,
            },
        );
    }

    counter!("aggregate_sources_total").increment(sources.len() as u64);
    histogram!("aggregate_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    ParsedData {
        date: date.to_string(),
        sources,
    }
}
