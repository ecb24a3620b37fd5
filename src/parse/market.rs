// src/parse/market.rs
//! Market quote parser: `TICKER: price (±pct%) | volume`, or with the ticker in
//! its own field (`TICKER | price (±pct%) | volume`).
//!
//! Only the percentage is read; the absolute change is derived from it so the
//! two can never disagree.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{first_match, non_blank_lines, pipe_fields, LineMatch, LineMatcher};
use crate::types::MarketQuote;

static RE_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]+)\s*\(([+-]?[\d.]+)%?\)").expect("price regex"));

const MARKET_MATCHERS: [LineMatcher<str, MarketQuote>; 2] = [
    LineMatcher { name: "colon", try_match: match_colon_line },
    LineMatcher { name: "piped", try_match: match_piped_line },
];

/// `price (pct%)` -> (price, pct). Thousands separators are accepted.
fn read_price_info(s: &str) -> Option<(i64, f64)> {
    let caps = RE_PRICE.captures(s)?;
    let price = caps[1].replace(',', "").parse::<i64>().ok()?;
    let pct = caps[2].parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some((price, pct))
}

/// `KT: 36,500 (+0.8%) | volume`
fn match_colon_line(line: &str) -> LineMatch<MarketQuote> {
    let p = pipe_fields(line);
    if p.len() < 2 {
        return LineMatch::Unmatched;
    }
    let Some((ticker, info)) = p[0].split_once(':') else {
        return LineMatch::Unmatched;
    };
    read_price_info(info)
        .map(|(price, pct)| MarketQuote::derived(ticker.trim(), price, pct, p[1]))
        .into()
}

/// `KT | 36,500 (+0.8%) | volume`
fn match_piped_line(line: &str) -> LineMatch<MarketQuote> {
    let p = pipe_fields(line);
    if p.len() < 2 {
        return LineMatch::Unmatched;
    }
    let ticker = p[0].replacen(':', "", 1).trim().to_string();
    let volume = p.get(2).copied().unwrap_or_default();
    read_price_info(p[1])
        .map(|(price, pct)| MarketQuote::derived(ticker, price, pct, volume))
        .into()
}

/// Parse quote lines; lines without a readable price/percentage are dropped.
pub fn parse_market(content: &str) -> Vec<MarketQuote> {
    non_blank_lines(content)
        .filter_map(|l| first_match(&MARKET_MATCHERS, l).map(|(_, q)| q))
        .collect()
}

/// First quote for `ticker`, if any.
pub fn find_quote<'a>(quotes: &'a [MarketQuote], ticker: &str) -> Option<&'a MarketQuote> {
    quotes.iter().find(|q| q.ticker == ticker)
}
