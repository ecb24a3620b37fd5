//! # Report writer
//! Fixed markdown templates filled with values computed from one date's drops.

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::parse::{non_blank_lines, parse_forum, parse_market};
use crate::storage::{DataStore, StorageResult};
use crate::trend::{generate_trend_prediction, SentimentTally};
use crate::types::{Direction, ForumItem, ReportMetadata, TrendPrediction};

const NO_DATA: &str = "데이터 없음";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Stock,
    Kt,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stock" => Some(Self::Stock),
            "kt" => Some(Self::Kt),
            _ => None,
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            Self::Stock => "stock.md",
            Self::Kt => "kt.md",
        }
    }
}

/// Listing entry for a stored report file.
pub fn report_metadata(date: &str, filename: &str) -> ReportMetadata {
    ReportMetadata {
        date: date.to_string(),
        filename: filename.to_string(),
        kind: filename.strip_suffix(".md").unwrap_or(filename).to_string(),
        path: format!("/report/{date}/{filename}"),
    }
}

fn strategy_line(d: Direction) -> &'static str {
    match d {
        Direction::Up => "단기 매수 포지션 고려",
        Direction::Down => "관망 또는 손절 검토",
        Direction::Neutral => "보유 유지 권장",
    }
}

pub fn render_stock_report(date: &str, prediction: &TrendPrediction) -> String {
    let reasons = prediction
        .reasons
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# 단기 전망 ({date})

## 내일 매수·매도 추이

**예측: {direction} (신뢰도 {confidence}%)**

### 근거
{reasons}

### 투자 전략
- {strategy}
- 거래량 변화 모니터링 필요
- 주요 공시 및 뉴스 주시

---
*본 리포트는 AI 기반 분석이며 투자 조언이 아닙니다.*
",
        direction = prediction.direction.label_ko(),
        confidence = prediction.confidence,
        strategy = strategy_line(prediction.direction),
    )
}

pub fn render_kt_report(date: &str, dart_summary: &str, news_summary: &str, sentiment_summary: &str) -> String {
    format!(
        "# KT Weekly Insight ({date})

## 요약
실적 무난, CAPEX 통제 양호, ARPU 회복 기대감 형성

## 기업 데이터 분석
{dart_summary}

## 시장 반응
{news_summary}

## 여론 동향
{sentiment_summary}

## 리스크 요인
- 보안/해킹 이슈 발생 시 민감도 높음
- 경쟁사 대비 5G 투자 효율성 모니터링 필요
- 규제 변화에 따른 수익성 영향 주시

## 투자 포인트
1. 안정적인 배당 수익률 (약 4-5%)
2. 통신 3사 중 밸류에이션 매력적
3. B2B 및 클라우드 사업 성장 가능성

---
*본 리포트는 참고용이며 투자 결정은 본인 책임입니다.*
"
    )
}

/// First line of the filing drop.
pub fn dart_summary(content: &str) -> String {
    match content.split('\n').next() {
        Some(first) if !first.is_empty() => first.to_string(),
        _ => NO_DATA.to_string(),
    }
}

/// First two lines of the news drop, comma-joined.
pub fn news_summary(content: &str) -> String {
    let joined = content.split('\n').take(2).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        NO_DATA.to_string()
    } else {
        joined
    }
}

pub fn sentiment_summary(forum: &[ForumItem]) -> String {
    if forum.is_empty() {
        return NO_DATA.to_string();
    }
    let t = SentimentTally::of(forum);
    format!("긍정 {}건, 중립 {}건, 부정 {}건", t.positive, t.neutral, t.negative)
}

/// Render and store each requested kind for `date`. Returns written filenames.
pub async fn generate_reports(store: &DataStore, date: &str, kinds: &[ReportKind]) -> StorageResult<Vec<String>> {
    let forum = parse_forum(&store.read_source_file(date, "forum.txt").await?);
    let market = parse_market(&store.read_source_file(date, "market.txt").await?);
    let dart = store.read_source_file(date, "dart.txt").await?;
    let news = store.read_source_file(date, "news.txt").await?;

    let mut generated = Vec::new();
    for kind in kinds {
        let body = match kind {
            ReportKind::Stock => render_stock_report(date, &generate_trend_prediction(&market, &forum)),
            ReportKind::Kt => render_kt_report(
                date,
                &dart_summary(&dart),
                &news_summary(&news),
                &sentiment_summary(&forum),
            ),
        };
        store.write_report(date, kind.filename(), &body).await?;
        counter!("reports_generated_total").increment(1);
        generated.push(kind.filename().to_string());
    }
    tracing::info!(
        target: "report",
        date,
        generated = ?generated,
        news_lines = non_blank_lines(&news).count(),
        "reports generated"
    );
    Ok(generated)
}
