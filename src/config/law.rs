// src/config/law.rs
//! Tax-law tables used by the personal-finance simulator.
//! Read from `<data_root>/law/*.json`; anything missing or unparsable falls back
//! to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const INCOME_TAX_FILE: &str = "income_tax_brackets.json";
pub const WITHHOLDING_RELIEF_FILE: &str = "withholding_relief.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// Upper bound of the bracket; `None` is open-ended.
    pub up_to: Option<u64>,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxTable {
    pub brackets: Vec<TaxBracket>,
}

impl Default for IncomeTaxTable {
    fn default() -> Self {
        Self {
            brackets: vec![
                TaxBracket { up_to: Some(14_000_000), rate: 0.06 },
                TaxBracket { up_to: Some(50_000_000), rate: 0.15 },
                TaxBracket { up_to: Some(88_000_000), rate: 0.24 },
                TaxBracket { up_to: None, rate: 0.24 },
            ],
        }
    }
}

/// Holding-period relief band `[min_years, max_years)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliefBand {
    pub min_years: f64,
    pub max_years: Option<f64>,
    pub rate: f64,
}

fn default_obligation_years() -> f64 {
    2.0
}
fn default_employment_income_tax_rate() -> f64 {
    0.15
}
fn default_reliefs() -> Vec<ReliefBand> {
    vec![
        ReliefBand { min_years: 0.0, max_years: Some(2.0), rate: 0.0 },
        ReliefBand { min_years: 2.0, max_years: Some(4.0), rate: 0.5 },
        ReliefBand { min_years: 4.0, max_years: None, rate: 0.75 },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithholdingRelief {
    #[serde(default = "default_obligation_years")]
    pub obligation_years: f64,
    #[serde(default = "default_reliefs")]
    pub reliefs: Vec<ReliefBand>,
    #[serde(default = "default_employment_income_tax_rate")]
    pub employment_income_tax_rate: f64,
}

impl Default for WithholdingRelief {
    fn default() -> Self {
        Self {
            obligation_years: default_obligation_years(),
            reliefs: default_reliefs(),
            employment_income_tax_rate: default_employment_income_tax_rate(),
        }
    }
}

impl WithholdingRelief {
    /// Relief rate for a holding period; 0 when no band covers it.
    pub fn rate_for_years(&self, years: f64) -> f64 {
        self.reliefs
            .iter()
            .find(|r| years >= r.min_years && r.max_years.map_or(true, |max| years < max))
            .map_or(0.0, |r| r.rate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LawConfig {
    pub income_tax: IncomeTaxTable,
    pub withholding_relief: WithholdingRelief,
}

impl LawConfig {
    /// Load both tables from `dir`, each independently falling back to defaults.
    pub fn load_from_dir(dir: &Path) -> Self {
        Self {
            income_tax: read_json_or_default(&dir.join(INCOME_TAX_FILE)),
            withholding_relief: read_json_or_default(&dir.join(WITHHOLDING_RELIEF_FILE)),
        }
    }
}

fn read_json_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "law table unreadable, using defaults");
            T::default()
        }),
        Err(_) => T::default(),
    }
}
