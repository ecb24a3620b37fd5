// src/parse/forum.rs
//! Forum sentiment parser: `[Platform] content (긍정|중립|부정)`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{non_blank_lines, LineMatch};
use crate::types::{ForumItem, Sentiment};

static RE_PLATFORM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]").expect("platform regex"));
static RE_SENTIMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((긍정|중립|부정)\)").expect("sentiment tag regex"));

fn match_forum_line(line: &str) -> LineMatch<ForumItem> {
    let Some(platform) = RE_PLATFORM.captures(line).and_then(|c| c.get(1)) else {
        return LineMatch::Unmatched;
    };
    let Some(sentiment) = RE_SENTIMENT
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| Sentiment::from_tag(m.as_str()))
    else {
        return LineMatch::Unmatched;
    };

    let without_platform = RE_PLATFORM.replace(line, "");
    let content = RE_SENTIMENT.replace(&without_platform, "").trim().to_string();

    LineMatch::Matched(ForumItem::new(platform.as_str(), content, sentiment))
}

/// Parse forum lines; a line needs both a `[platform]` and a `(sentiment)` tag.
pub fn parse_forum(content: &str) -> Vec<ForumItem> {
    non_blank_lines(content)
        .filter_map(|l| match_forum_line(l).into_option())
        .collect()
}
