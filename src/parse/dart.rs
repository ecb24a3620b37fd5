// src/parse/dart.rs
//! Corporate-filing (DART) summary parser.

use super::non_blank_lines;
use crate::types::DartSummary;

/// Keywords in priority order. A line may hit several of them.
const KEYWORDS: [(&str, Field); 5] = [
    ("매출", Field::Revenue),
    ("영업이익", Field::OperatingIncome),
    ("CAPEX", Field::Capex),
    ("인건비", Field::Headcount),
    ("자사주", Field::Treasury),
];

#[derive(Clone, Copy)]
enum Field {
    Revenue,
    OperatingIncome,
    Capex,
    Headcount,
    Treasury,
}

impl DartSummary {
    fn slot(&mut self, f: Field) -> &mut String {
        match f {
            Field::Revenue => &mut self.revenue,
            Field::OperatingIncome => &mut self.operating_income,
            Field::Capex => &mut self.capex,
            Field::Headcount => &mut self.headcount,
            Field::Treasury => &mut self.treasury,
        }
    }
}

/// Assign whole lines to summary fields by keyword; later lines overwrite earlier ones.
pub fn parse_dart(content: &str) -> DartSummary {
    let mut out = DartSummary::default();
    for line in non_blank_lines(content) {
        for (kw, field) in KEYWORDS {
            if line.contains(kw) {
                *out.slot(field) = line.to_string();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "2025Q3 매출 6.12조(+3.1% YoY), 영업이익 4,150억(+2.3% YoY)
5G CAPEX 8,200억 집행, 인건비 전년동기비 +1.2%
자사주 보유 1.2% (변동없음)
부채비율 142% (전분기 대비 -3%p)";

    #[test]
    fn one_line_can_fill_several_fields() {
        let d = parse_dart(SAMPLE);
        assert_eq!(d.revenue, "2025Q3 매출 6.12조(+3.1% YoY), 영업이익 4,150억(+2.3% YoY)");
        assert_eq!(d.operating_income, d.revenue);
        assert_eq!(d.capex, "5G CAPEX 8,200억 집행, 인건비 전년동기비 +1.2%");
        assert_eq!(d.headcount, d.capex);
        assert_eq!(d.treasury, "자사주 보유 1.2% (변동없음)");
    }

    #[test]
    fn last_matching_line_wins() {
        let d = parse_dart("매출 1조\n매출 2조\n");
        assert_eq!(d.revenue, "매출 2조");
    }

    #[test]
    fn unmatched_text_leaves_fields_empty() {
        assert_eq!(parse_dart("부채비율 142%\n\n"), DartSummary::default());
        assert_eq!(parse_dart(""), DartSummary::default());
    }

    #[test]
    fn reparsing_is_idempotent() {
        assert_eq!(parse_dart(SAMPLE), parse_dart(SAMPLE));
    }
}
