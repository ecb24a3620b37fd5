// tests/aggregate_trend.rs
//
// Aggregation precedence, the report trend heuristic and the windowed
// projection, all through the library surface.

use kt_stock_monitor::aggregate::{aggregate, ParsedRecords};
use kt_stock_monitor::types::{Direction, ForumItem, MarketQuote, Sentiment};
use kt_stock_monitor::{generate_trend_prediction, parse_news, project_next_close};

fn files(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(n, c)| (n.to_string(), c.to_string())).collect()
}

const PLAIN_NEWS: &str = "[09:10] 파이낸셜뉴스 | KT, AI센터 확대";
const LINKED_NEWS: &str = "KT, AI센터 확대 | https://news.example/1 | 파이낸셜뉴스";

#[test]
fn new_list_beats_news_in_either_discovery_order() {
    for order in [
        files(&[("new-list.txt", LINKED_NEWS), ("news.txt", PLAIN_NEWS)]),
        files(&[("news.txt", PLAIN_NEWS), ("new-list.txt", LINKED_NEWS)]),
    ] {
        let data = aggregate("2025-10-16", &order);
        let news = data.sources.get("news").expect("news key");
        assert_eq!(news.filename, "new-list.txt");
        assert_eq!(data.news(), parse_news(LINKED_NEWS).as_slice());
        assert!(data.sources.get("new-list").is_none(), "no stray key for the richer file");
    }
}

#[test]
fn plain_news_used_when_alone_and_custom_keys_pass_through() {
    let data = aggregate(
        "2025-10-16",
        &files(&[("news.txt", PLAIN_NEWS), ("memo.txt", "메모\n\n둘째 줄")]),
    );
    assert_eq!(data.sources.get("news").unwrap().filename, "news.txt");

    let memo = data.sources.get("memo").expect("custom key");
    assert_eq!(memo.lines, vec!["메모", "둘째 줄"]);
    assert!(matches!(&memo.parsed, ParsedRecords::Raw { raw } if raw.contains("둘째")));

    let keys: Vec<_> = data.sources.keys().collect();
    assert_eq!(keys, ["news", "memo"]);
}

#[test]
fn parsed_data_serializes_as_keyed_object() {
    let data = aggregate("2025-10-16", &files(&[("forum.txt", "[Blind] 좋아요 (긍정)")]));
    let v = serde_json::to_value(&data).unwrap();
    assert_eq!(v["date"], "2025-10-16");
    assert_eq!(v["sources"]["forum"]["filename"], "forum.txt");
    assert_eq!(v["sources"]["forum"]["parsed"][0]["sentiment"], "positive");
}

fn kt(pct: f64) -> MarketQuote {
    MarketQuote::derived("KT", 36_500, pct, "거래량 2.1M")
}

fn forum(tags: &[Sentiment]) -> Vec<ForumItem> {
    tags.iter().map(|s| ForumItem::new("Blind", "x", *s)).collect()
}

#[test]
fn up_call_needs_move_and_positive_crowd() {
    let p = generate_trend_prediction(&[kt(1.0)], &forum(&[Sentiment::Positive, Sentiment::Positive]));
    assert_eq!(p.direction, Direction::Up);
    assert_eq!(p.confidence, 75);
    assert_eq!(p.reasons.len(), 3, "two fixed reasons plus the positive-majority note");
}

#[test]
fn down_call_and_neutral_fallbacks() {
    let neg = forum(&[Sentiment::Negative, Sentiment::Neutral]);
    let p = generate_trend_prediction(&[kt(-0.5)], &neg);
    assert_eq!((p.direction, p.confidence), (Direction::Down, 70));
    assert_eq!(p.reasons.len(), 2);

    // move without matching sentiment stays neutral
    let p = generate_trend_prediction(&[kt(2.0)], &neg);
    assert_eq!((p.direction, p.confidence), (Direction::Neutral, 60));
}

#[test]
fn no_primary_quote_is_quiet_neutral() {
    let other = MarketQuote::derived("SKT", 56_800, 3.0, "-");
    let p = generate_trend_prediction(&[other], &forum(&[Sentiment::Positive]));
    assert_eq!(p.direction, Direction::Neutral);
    assert_eq!(p.confidence, 50);
    assert!(p.reasons.is_empty());
}

#[test]
fn projection_follows_steady_growth() {
    // +1% every day
    let closes: Vec<f64> = (0..30).map(|i| 10_000.0 * 1.01f64.powi(i)).collect();
    let p = project_next_close(&closes).expect("enough history");
    assert_eq!(p.window_size, 20);
    assert!((p.avg_return - 0.01).abs() < 1e-9);
    assert!(p.volatility < 1e-9);
    assert_eq!(p.predicted_change_pct, 1.0);
    assert!((p.confidence - 0.6).abs() < 1e-9);
    assert_eq!(p.predicted_price, (closes[29] * 1.01).round() as i64);

    assert!(project_next_close(&closes[..24]).is_none());
}
