// src/parse/news.rs
//! News headline parser. Three line shapes are accepted, tried in this order:
//!
//! 1. `title | url | source`            (collector v2)
//! 2. `pubDate | source | title | url`  (collector v1)
//! 3. `[HH:MM]Source | Title | (tag)`   (hand-written legacy drops)

use once_cell::sync::Lazy;
use regex::Regex;

use super::{first_match, non_blank_lines, pipe_fields, LineMatch, LineMatcher};
use crate::types::NewsItem;

const URL_PREFIX: &str = "http";

static RE_TIME_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{2}:\d{2})\]").expect("time bracket regex"));

const NEWS_MATCHERS: [LineMatcher<str, NewsItem>; 3] = [
    LineMatcher { name: "v2", try_match: match_v2 },
    LineMatcher { name: "v1", try_match: match_v1 },
    LineMatcher { name: "legacy", try_match: match_legacy },
];

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn match_v2(line: &str) -> LineMatch<NewsItem> {
    let p = pipe_fields(line);
    if p.len() < 3 || !p[1].starts_with(URL_PREFIX) {
        return LineMatch::Unmatched;
    }
    LineMatch::Matched(NewsItem {
        time: String::new(),
        source: p[2].to_string(),
        title: p[0].to_string(),
        url: non_empty(p[1]),
        sentiment: None,
    })
}

fn match_v1(line: &str) -> LineMatch<NewsItem> {
    let p = pipe_fields(line);
    if p.len() < 4 || !p[3].starts_with(URL_PREFIX) {
        return LineMatch::Unmatched;
    }
    LineMatch::Matched(NewsItem {
        time: p[0].to_string(),
        source: p[1].to_string(),
        title: p[2].to_string(),
        url: non_empty(p[3]),
        sentiment: None,
    })
}

fn match_legacy(line: &str) -> LineMatch<NewsItem> {
    let p = pipe_fields(line);
    if p.len() < 2 {
        return LineMatch::Unmatched;
    }
    let head = p[0];
    let time = RE_TIME_BRACKET
        .captures(head)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let source = RE_TIME_BRACKET.replace(head, "").trim().to_string();

    LineMatch::Matched(NewsItem {
        time,
        source,
        title: p[1].to_string(),
        url: None,
        sentiment: p.get(2).and_then(|s| non_empty(s)),
    })
}

/// Parse news lines; lines with fewer than two `|`-separated fields are dropped.
pub fn parse_news(content: &str) -> Vec<NewsItem> {
    non_blank_lines(content)
        .filter_map(|line| first_match(&NEWS_MATCHERS, line).map(|(_, item)| item))
        .collect()
}

/// Like [`parse_news`], but also reports which shape accepted each line.
pub fn parse_news_tagged(content: &str) -> Vec<(&'static str, NewsItem)> {
    non_blank_lines(content)
        .filter_map(|line| first_match(&NEWS_MATCHERS, line))
        .collect()
}
