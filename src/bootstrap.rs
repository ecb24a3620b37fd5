//! Seed today's directory with sample drops and reports on a fresh install.

use chrono::{NaiveDate, TimeDelta, Utc};

use crate::report::{generate_reports, ReportKind};
use crate::storage::{DataStore, StorageResult};

const KST_OFFSET_SECS: i64 = 9 * 3600;

pub const SAMPLE_DART: &str = "2025Q3 매출 6.12조(+3.1% YoY), 영업이익 4,150억(+2.3% YoY)
5G CAPEX 8,200억 집행, 인건비 전년동기비 +1.2%
자사주 보유 1.2% (변동없음)
부채비율 142% (전분기 대비 -3%p)
당기순이익 3,280억 (+5.4% YoY)";

pub const SAMPLE_NEWS: &str = "[09:10] 파이낸셜뉴스 | KT, AI센터 확대… B2B 수주 확대 기대
[11:35] 전자공시 | 최대주주 변동 없음 공시
[13:05] 블룸버그 | 통신 3사, ARPU 회복세
[14:20] 한국경제 | KT 클라우드 사업 매출 20% 증가
[16:45] 연합뉴스 | 5G 가입자 1000만 돌파";

pub const SAMPLE_FORUM: &str = "[Blind] 실적 무난, 배당 기대 ↑ (긍정)
[종토방] 단기 반등 이후 숨고르기 (중립)
[Reddit] Korea telcos undervalued thesis (긍정)
[DC] 실시간 체감 품질 글 늘었음 (중립)
[Blind] 경쟁사 대비 밸류에이션 매력적 (긍정)";

pub const SAMPLE_MARKET: &str = "KT: 36,500 (+0.8%) | 거래량 2.1M
SKT: 56,800 (+0.4%) | 거래량 1.3M
LGU+: 9,850 (+0.3%) | 거래량 0.9M";

/// Calendar date in Korea (UTC+9).
pub fn today_kst() -> NaiveDate {
    (Utc::now() + TimeDelta::seconds(KST_OFFSET_SECS)).date_naive()
}

/// Write the four sample drops for `date` and render both reports.
/// Does nothing and returns `false` when `date` already has a directory.
pub async fn bootstrap_date(store: &DataStore, date: &str) -> StorageResult<bool> {
    store.ensure_roots().await?;
    if store.list_dates().await?.iter().any(|d| d == date) {
        tracing::debug!(target: "storage", date, "bootstrap skipped, data present");
        return Ok(false);
    }

    for (name, body) in [
        ("dart.txt", SAMPLE_DART),
        ("news.txt", SAMPLE_NEWS),
        ("forum.txt", SAMPLE_FORUM),
        ("market.txt", SAMPLE_MARKET),
    ] {
        store.write_source_file(date, name, body).await?;
    }

    // A failed report render must not undo the seeded drops.
    if let Err(e) = generate_reports(store, date, &[ReportKind::Stock, ReportKind::Kt]).await {
        tracing::warn!(target: "report", date, error = %e, "bootstrap report generation failed");
    }
    tracing::info!(target: "storage", date, "sample data bootstrapped");
    Ok(true)
}

/// [`bootstrap_date`] for today in KST.
pub async fn bootstrap_today(store: &DataStore) -> StorageResult<bool> {
    let today = today_kst().format("%Y-%m-%d").to_string();
    bootstrap_date(store, &today).await
}
