//! # Personal-finance simulator
//! Employee-share (우리사주) helpers: contribution tax saving, withdrawal tax
//! estimate with holding-period relief, and a few price helpers.
//!
//! Pure functions over loaded holdings/salary and the law tables.

use std::path::Path;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::law::{LawConfig, TaxBracket};

/// Trading days assumed per month.
pub const TRADING_DAYS_PER_MONTH: usize = 21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub acq_date: NaiveDate,
    /// Purchase price per share.
    pub price: i64,
    pub shares: u64,
    #[serde(default)]
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryMonth {
    pub month: String,
    #[serde(default)]
    pub gross: u64,
}

#[derive(Debug, Default, Deserialize)]
struct HoldingsFile {
    #[serde(default)]
    holdings: Vec<Holding>,
}

#[derive(Debug, Default, Deserialize)]
struct SalaryFile {
    #[serde(default)]
    months: Vec<SalaryMonth>,
}

/// `<my_dir>/holdings.json`; missing or unreadable ⇒ empty.
pub async fn load_holdings(my_dir: &Path) -> Vec<Holding> {
    read_json::<HoldingsFile>(&my_dir.join("holdings.json")).await.holdings
}

/// `<my_dir>/salary.json`; missing or unreadable ⇒ empty.
pub async fn load_salary(my_dir: &Path) -> Vec<SalaryMonth> {
    read_json::<SalaryFile>(&my_dir.join("salary.json")).await.months
}

async fn read_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "personal data file unreadable");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

/// Progressive income tax on `base`.
pub fn income_tax(base: u64, brackets: &[TaxBracket]) -> f64 {
    let mut tax = 0.0;
    let mut prev = 0u64;
    for b in brackets {
        let cap = b.up_to.map_or(base, |up| base.min(up));
        if cap > prev {
            tax += (cap - prev) as f64 * b.rate;
            prev = cap;
        }
        if prev >= base {
            break;
        }
    }
    tax
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionTaxSim {
    pub total_income: u64,
    pub original: u64,
    pub after: u64,
    pub saving: u64,
}

/// Tax before/after deducting a yearly share-plan contribution from salary.
pub fn contribution_tax_sim(salary: &[SalaryMonth], annual_contribution: u64, law: &LawConfig) -> ContributionTaxSim {
    let brackets = &law.income_tax.brackets;
    let total_income = salary.iter().fold(0u64, |acc, m| acc.saturating_add(m.gross));
    let original = income_tax(total_income, brackets).round() as u64;
    let after = income_tax(total_income.saturating_sub(annual_contribution), brackets).round() as u64;
    ContributionTaxSim {
        total_income,
        original,
        after,
        saving: original.saturating_sub(after),
    }
}

fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Fractional years (365-day years).
pub fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    days_between(from, to) as f64 / 365.0
}

/// Whether the mandatory holding obligation has elapsed by `withdraw`.
pub fn has_passed_obligation(acq: NaiveDate, withdraw: NaiveDate, obligation_years: f64) -> bool {
    days_between(acq, withdraw) as f64 >= 365.0 * obligation_years
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub target_years: u32,
    pub target_date: NaiveDate,
    pub extra_saving: i64,
}

/// Next relief step (2y, then 4y) not yet reached at `as_of`.
pub fn next_milestone(acq: NaiveDate, as_of: NaiveDate) -> Option<(u32, NaiveDate)> {
    let y = years_between(acq, as_of);
    let target_years = if y < 2.0 {
        2
    } else if y < 4.0 {
        4
    } else {
        return None;
    };
    let date = acq.checked_add_months(Months::new(12 * target_years))?;
    Some((target_years, date))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRow {
    pub acq_date: NaiveDate,
    pub method: String,
    pub shares: u64,
    pub tax_basis: i64,
    pub gross_gain: i64,
    pub relief_rate: f64,
    pub relief_applied: i64,
    pub taxable_base: i64,
    pub est_tax: i64,
    pub passed: bool,
    pub years_held: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalSim {
    pub total_tax: i64,
    pub potential_saving: i64,
    pub total_next_saving: i64,
    /// Average of the last month of closes (or the market price).
    pub month_average: i64,
    pub rows: Vec<WithdrawalRow>,
}

/// Average of the last [`TRADING_DAYS_PER_MONTH`] closes, or `fallback` without history.
pub fn last_month_average(closes: &[f64], fallback: i64) -> i64 {
    let tail = &closes[closes.len().saturating_sub(TRADING_DAYS_PER_MONTH)..];
    if tail.is_empty() {
        return fallback;
    }
    (tail.iter().sum::<f64>() / tail.len() as f64).round() as i64
}

/// Estimated withholding on withdrawing every holding at `withdraw`.
///
/// Tax basis is the lower of purchase price and last-month average close;
/// relief shrinks the taxable base by the holding-period rate.
pub fn withdrawal_sim(
    holdings: &[Holding],
    withdraw: NaiveDate,
    market_price: i64,
    closes: &[f64],
    law: &LawConfig,
) -> WithdrawalSim {
    let relief = &law.withholding_relief;
    let base_rate = relief.employment_income_tax_rate;
    let month_average = last_month_average(closes, market_price);

    let mut rows = Vec::with_capacity(holdings.len());
    let (mut total_tax, mut relief_potential, mut total_next_saving) = (0i64, 0.0f64, 0i64);

    for h in holdings {
        let shares = h.shares as f64;
        let tax_basis = h.price.min(month_average);
        let gross_gain = market_price
            .saturating_sub(tax_basis)
            .max(0)
            .saturating_mul(i64::try_from(h.shares).unwrap_or(i64::MAX));
        let years_held = years_between(h.acq_date, withdraw);
        let rate = relief.rate_for_years(years_held);
        let basis_total = tax_basis as f64 * shares;
        let relief_applied = (basis_total * rate).round() as i64;
        let taxable_base = ((basis_total * (1.0 - rate)).round() as i64).max(0);
        let est_tax = (taxable_base as f64 * base_rate).round() as i64;

        total_tax = total_tax.saturating_add(est_tax);
        relief_potential += relief_applied as f64 * base_rate;

        let milestone = next_milestone(h.acq_date, withdraw).map(|(target_years, target_date)| {
            let future_rate = relief.rate_for_years(target_years as f64);
            let future_relief = (basis_total * future_rate).round() as i64;
            let extra_relief = (future_relief - relief_applied).max(0);
            let extra_saving = (extra_relief as f64 * base_rate).round() as i64;
            total_next_saving = total_next_saving.saturating_add(extra_saving);
            Milestone {
                target_years,
                target_date,
                extra_saving,
            }
        });

        rows.push(WithdrawalRow {
            acq_date: h.acq_date,
            method: h.method.clone(),
            shares: h.shares,
            tax_basis,
            gross_gain,
            relief_rate: rate,
            relief_applied,
            taxable_base,
            est_tax,
            passed: has_passed_obligation(h.acq_date, withdraw, relief.obligation_years),
            years_held,
            milestone,
        });
    }

    WithdrawalSim {
        total_tax,
        potential_saving: relief_potential.round() as i64,
        total_next_saving,
        month_average,
        rows,
    }
}

fn total_shares(holdings: &[Holding]) -> u64 {
    holdings.iter().fold(0u64, |acc, h| acc.saturating_add(h.shares))
}

/// Cost-weighted average purchase price; 0 without shares.
pub fn break_even(holdings: &[Holding]) -> i64 {
    let shares = total_shares(holdings);
    if shares == 0 {
        return 0;
    }
    let cost: f64 = holdings.iter().map(|h| h.price as f64 * h.shares as f64).sum();
    (cost / shares as f64).round() as i64
}

/// One-month-ahead price from the mean daily log return (needs ≥5 returns,
/// otherwise the last close is returned unchanged).
pub fn suggest_next_month_price(closes: &[f64]) -> Option<i64> {
    let prices: Vec<f64> = closes.iter().copied().filter(|p| *p > 0.0).collect();
    let last = *prices.last()?;
    if prices.len() < 2 {
        return None;
    }
    let rets: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let mean_daily = if rets.len() >= 5 {
        rets.iter().sum::<f64>() / rets.len() as f64
    } else {
        0.0
    };
    let mu_month = mean_daily * TRADING_DAYS_PER_MONTH as f64;
    Some(((last * mu_month.exp()).round() as i64).max(1))
}

/// Bars of the holding-period tax illustration.
pub const TAX_SCENARIOS: [(&str, f64); 3] = [("1년 미만", 0.22), ("1~2년", 0.15), ("3년+", 0.09)];

/// Gain assumed when the position shows less than this.
pub const MIN_SCENARIO_GAIN: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxScenario {
    pub label: &'static str,
    pub rate: f64,
    pub tax: i64,
}

/// Tax on the current paper gain (at least [`MIN_SCENARIO_GAIN`]) under each
/// holding-period rate.
pub fn tax_scenarios(last_close: Option<f64>, break_even: i64, holdings: &[Holding]) -> Vec<TaxScenario> {
    let per_share = (last_close.unwrap_or(0.0) - break_even as f64).max(0.0);
    let paper = (per_share * total_shares(holdings) as f64).round() as i64;
    let gain = paper.max(MIN_SCENARIO_GAIN);
    TAX_SCENARIOS
        .iter()
        .map(|&(label, rate)| TaxScenario {
            label,
            rate,
            tax: (gain as f64 * rate).round() as i64,
        })
        .collect()
}

/// Months covered by the share-plan projection.
pub const ESOP_MONTHS: u32 = 60;

/// Daily volatility assumed when history is too short to estimate it.
const DEFAULT_DAILY_SIGMA: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EsopPoint {
    /// `YYYY-MM`
    pub date: String,
    pub price: i64,
    pub with_esop: i64,
    pub without_esop: i64,
}

/// Expected-path (zero shock) monthly projection of holding plus buying with
/// the plan contribution, against keeping the contribution as cash.
///
/// Needs at least five positive closes. Drift and volatility come from daily
/// log returns when there are five or more, else zero drift and 1% daily.
pub fn esop_projection(
    closes: &[f64],
    holdings: &[Holding],
    annual_contribution: u64,
    months: u32,
    from: NaiveDate,
) -> Option<Vec<EsopPoint>> {
    if closes.len() < 5 {
        return None;
    }
    let prices: Vec<f64> = closes.iter().copied().filter(|p| p.is_finite() && *p > 0.0).collect();
    if prices.len() < 5 {
        return None;
    }
    let rets: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let (mean_daily, sigma_daily) = if rets.len() >= 5 {
        let n = rets.len() as f64;
        let mean = rets.iter().sum::<f64>() / n;
        let var = rets.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    } else {
        (0.0, DEFAULT_DAILY_SIGMA)
    };

    let days = TRADING_DAYS_PER_MONTH as f64;
    let mu_m = mean_daily * days;
    let sigma_m = sigma_daily * days.sqrt();
    let growth = (mu_m - 0.5 * sigma_m * sigma_m).exp();
    let monthly = (annual_contribution as f64 / 12.0).round() as i64;

    let mut price = prices[prices.len() - 1];
    let mut shares = total_shares(holdings) as f64;
    let mut contributed = 0i64;

    let points = (1..=months)
        .map(|m| {
            price = (price * growth).round().max(1.0);
            if monthly > 0 {
                shares += monthly as f64 / price;
                contributed = contributed.saturating_add(monthly);
            }
            let date = from
                .checked_add_months(Months::new(m))
                .map_or_else(String::new, |d| d.format("%Y-%m").to_string());
            EsopPoint {
                date,
                price: price as i64,
                with_esop: (shares * price).round() as i64,
                without_esop: contributed,
            }
        })
        .collect();
    Some(points)
}
