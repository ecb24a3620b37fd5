//! # Trend heuristics
//! Two independent, pure models:
//!
//! * [`generate_trend_prediction`]: rule table over the primary ticker's daily
//!   move and aggregate forum sentiment. Feeds the stock report.
//! * [`project_next_close`]: naive next-close projection from the trailing
//!   20-day window of simple returns. Feeds the live dashboard.
//!
//! The two are not reconciled and may disagree.

use serde::Serialize;

use crate::parse::market::find_quote;
use crate::types::{Direction, ForumItem, MarketQuote, Sentiment, TrendPrediction};

/// Ticker the report heuristic looks at.
pub const PRIMARY_TICKER: &str = "KT";

const MOVE_THRESHOLD_PCT: f64 = 0.5;
const MAX_REASONS: usize = 3;

const UP_REASONS: [&str; 2] = ["긍정적 뉴스 흐름과 거래량 증가 패턴 감지", "여론 감성 지표 긍정적"];
const DOWN_REASONS: [&str; 2] = ["부정적 여론과 가격 하락 추세", "거래량 감소 신호"];
const FLAT_REASONS: [&str; 2] = ["보합세 유지 예상", "뉴스 및 여론 중립적"];
const MORE_POSITIVE_REASON: &str = "긍정 의견이 부정 의견보다 많음";

/// Per-class forum counts plus the summed score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentTally {
    pub score: i32,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentTally {
    pub fn of(items: &[ForumItem]) -> Self {
        items.iter().fold(Self::default(), |mut t, it| {
            t.score += it.score;
            match it.sentiment {
                Sentiment::Positive => t.positive += 1,
                Sentiment::Neutral => t.neutral += 1,
                Sentiment::Negative => t.negative += 1,
            }
            t
        })
    }
}

/// Report heuristic for [`PRIMARY_TICKER`].
pub fn generate_trend_prediction(market: &[MarketQuote], forum: &[ForumItem]) -> TrendPrediction {
    generate_trend_prediction_for(PRIMARY_TICKER, market, forum)
}

/// Report heuristic for any ticker. Without a quote for `ticker` the result is
/// neutral/50 with no reasons.
pub fn generate_trend_prediction_for(
    ticker: &str,
    market: &[MarketQuote],
    forum: &[ForumItem],
) -> TrendPrediction {
    let Some(quote) = find_quote(market, ticker) else {
        return TrendPrediction::new(Direction::Neutral, 50);
    };
    let tally = SentimentTally::of(forum);
    let pct = quote.change_percent;

    let (direction, confidence, fixed) = if pct >= MOVE_THRESHOLD_PCT && tally.score > 0 {
        (Direction::Up, 75, UP_REASONS)
    } else if pct <= -MOVE_THRESHOLD_PCT && tally.score < 0 {
        (Direction::Down, 70, DOWN_REASONS)
    } else {
        (Direction::Neutral, 60, FLAT_REASONS)
    };

    let mut out = TrendPrediction::new(direction, confidence);
    out.reasons.extend(fixed.iter().map(|s| s.to_string()));
    if tally.positive > tally.negative {
        out.reasons.push(MORE_POSITIVE_REASON.to_string());
    }
    out.reasons.truncate(MAX_REASONS);
    out
}

/// Trailing window, in trading days.
pub const PROJECTION_WINDOW: usize = 20;
/// Minimum closes required before projecting.
pub const PROJECTION_MIN_HISTORY: usize = 25;
const PROJECTION_MIN_RETURNS: usize = 5;

/// Output of [`project_next_close`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceProjection {
    pub last_close: f64,
    pub predicted_price: i64,
    /// Average return in percent, two decimals.
    pub predicted_change_pct: f64,
    /// `clamp(0.6 - volatility * 8, 0, 1)`.
    pub confidence: f64,
    pub avg_return: f64,
    pub volatility: f64,
    pub window_size: usize,
}

/// Next-close projection from oldest-first daily closes. Returns `None` when
/// history is too short or too few usable returns remain.
pub fn project_next_close(closes: &[f64]) -> Option<PriceProjection> {
    if closes.len() < PROJECTION_MIN_HISTORY {
        return None;
    }
    let last_close = *closes.last()?;
    let start = closes.len() - PROJECTION_WINDOW;

    let returns: Vec<f64> = (start..closes.len())
        .filter_map(|i| {
            let prev = closes[i - 1];
            (prev > 0.0).then(|| closes[i] / prev - 1.0)
        })
        .collect();
    if returns.len() < PROJECTION_MIN_RETURNS {
        return None;
    }

    let n = returns.len() as f64;
    let avg = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n;
    let vol = variance.sqrt();

    Some(PriceProjection {
        last_close,
        predicted_price: (last_close * (1.0 + avg)).round() as i64,
        predicted_change_pct: (avg * 100.0 * 100.0).round() / 100.0,
        confidence: (0.6 - vol * 8.0).clamp(0.0, 1.0),
        avg_return: avg,
        volatility: vol,
        window_size: PROJECTION_WINDOW,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_each_class() {
        let items = vec![
            ForumItem::new("a", "x", Sentiment::Positive),
            ForumItem::new("b", "y", Sentiment::Negative),
            ForumItem::new("c", "z", Sentiment::Positive),
            ForumItem::new("d", "w", Sentiment::Neutral),
        ];
        let t = SentimentTally::of(&items);
        assert_eq!(t, SentimentTally { score: 1, positive: 2, neutral: 1, negative: 1 });
    }

    #[test]
    fn flat_series_projects_last_close_with_full_band() {
        let closes = vec![40_000.0; 30];
        let p = project_next_close(&closes).unwrap();
        assert_eq!(p.predicted_price, 40_000);
        assert_eq!(p.predicted_change_pct, 0.0);
        assert!((p.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn short_history_yields_none() {
        assert!(project_next_close(&vec![1.0; PROJECTION_MIN_HISTORY - 1]).is_none());
    }
}
