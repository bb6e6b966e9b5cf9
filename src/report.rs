use std::fmt::Write;

use num_format::{Locale, ToFormattedString};

use crate::models::{ComparisonMode, EntityResult, Kpi, KpiFormat};
use crate::rollup::{budget_misaligned, Rollup};

fn thousands(value: f64) -> String {
    (value.abs().round() as i64).to_formatted_string(&Locale::en)
}

/// Display form of a KPI value; absent values render as `-`.
pub fn format_value(kpi: Kpi, value: Option<f64>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    match kpi.config().format {
        KpiFormat::Currency => {
            let sign = if value < 0.0 { "-" } else { "" };
            format!("{sign}${}", thousands(value))
        }
        KpiFormat::Percent => format!("{:.1}%", value * 100.0),
        KpiFormat::Number => format!("{value:.2}"),
    }
}

pub fn format_variance(kpi: Kpi, value: Option<f64>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    let sign = if value < 0.0 { "-" } else { "+" };
    let body = match kpi.config().format {
        KpiFormat::Currency => format!("{sign}${}", thousands(value)),
        KpiFormat::Percent => format!("{sign}{:.1} pts", value.abs() * 100.0),
        KpiFormat::Number => format!("{sign}{:.2}", value.abs()),
    };
    match judge(kpi, value) {
        Some(true) => format!("{body} (better)"),
        Some(false) => format!("{body} (worse)"),
        None => body,
    }
}

/// Whether a variance moves the KPI in its preferred direction.
pub fn judge(kpi: Kpi, variance: f64) -> Option<bool> {
    if variance == 0.0 {
        return None;
    }
    Some((variance > 0.0) == kpi.config().higher_is_better)
}

fn entity_table(output: &mut String, name: &str, result: &EntityResult) {
    let _ = writeln!(output, "### {name}");
    let _ = writeln!(output);
    if result.actual.is_empty() {
        let _ = writeln!(output, "No data reported for this selection.");
        let _ = writeln!(output);
        return;
    }
    let _ = writeln!(output, "| KPI | Actual | Comparison | Variance |");
    let _ = writeln!(output, "|---|---:|---:|---:|");
    for kpi in Kpi::ALL {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            kpi.label(),
            format_value(kpi, result.actual.get(kpi)),
            format_value(kpi, result.comparison.get(kpi)),
            format_variance(kpi, result.variance.get(kpi))
        );
    }
    let _ = writeln!(output);
}

pub fn build_report(rollup: &Rollup, rank_by: Option<Kpi>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# KPI Roll-up: {}", rollup.view);
    let _ = writeln!(
        output,
        "{} ({} to {}), {}",
        rollup.period.label, rollup.period.start, rollup.period.end, rollup.mode
    );
    match &rollup.comparison_period {
        Some(cp) => {
            let _ = writeln!(output, "Compared with {} ({} to {})", cp.label, cp.start, cp.end);
        }
        None if rollup.mode == ComparisonMode::Budget => {
            let month = rollup.period.start.format("%B %Y").to_string();
            let _ = writeln!(output, "Compared with budget for {month}");
            if budget_misaligned(&rollup.period) {
                let _ = writeln!(
                    output,
                    "Warning: the {month} budget does not line up with {} ({} to {}); \
                     treat the budget variance as indicative only.",
                    rollup.period.label, rollup.period.start, rollup.period.end
                );
            }
        }
        None => {
            let _ = writeln!(output, "No comparison period available.");
        }
    }
    let _ = writeln!(output);

    if let Some(total) = rollup.total() {
        let _ = writeln!(output, "## Total");
        let _ = writeln!(output);
        entity_table(&mut output, &rollup.total_key, total);
    }

    let _ = writeln!(output, "## Breakdown");
    let _ = writeln!(output);
    for (name, result) in rollup.entries.iter().filter(|(n, _)| **n != rollup.total_key) {
        entity_table(&mut output, name, result);
    }

    if let Some(kpi) = rank_by {
        let _ = writeln!(output, "## Ranking by {}", kpi.label());
        let _ = writeln!(output);
        for (idx, (name, value)) in rollup.rank(kpi).into_iter().enumerate() {
            let _ = writeln!(output, "{}. {} {}", idx + 1, name, format_value(kpi, value));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::calendar::FiscalCalendar;
    use crate::models::{KpiBundle, View};

    #[test]
    fn absent_values_render_as_dash() {
        assert_eq!(format_value(Kpi::Sales, None), "-");
        assert_eq!(format_variance(Kpi::Sop, None), "-");
        assert_eq!(format_value(Kpi::Sales, Some(0.0)), "$0");
    }

    #[test]
    fn formats_by_kpi_kind() {
        assert_eq!(format_value(Kpi::Sales, Some(1_234_567.4)), "$1,234,567");
        assert_eq!(format_value(Kpi::FoodCost, Some(0.2862)), "28.6%");
        assert_eq!(format_value(Kpi::AvgReviews, Some(4.4)), "4.40");
        assert_eq!(format_variance(Kpi::Sales, Some(-2500.0)), "-$2,500 (worse)");
        assert_eq!(format_variance(Kpi::PrimeCost, Some(-0.012)), "-1.2 pts (better)");
        assert_eq!(format_variance(Kpi::Sales, Some(0.0)), "+$0");
    }

    #[test]
    fn report_lists_total_breakdown_and_ranking() {
        let calendar = FiscalCalendar::new(2026, 2026).unwrap();
        let period = calendar.find_by_label("P1 FY2026").unwrap().clone();
        let mut entries = BTreeMap::new();
        let actual = KpiBundle::empty().with(Kpi::Sales, 5000.0);
        entries.insert(
            "Total Company".to_string(),
            EntityResult {
                actual,
                comparison: KpiBundle::empty(),
                variance: KpiBundle::empty(),
            },
        );
        entries.insert(
            "North Region".to_string(),
            EntityResult {
                actual,
                comparison: KpiBundle::empty(),
                variance: KpiBundle::empty(),
            },
        );
        entries.insert(
            "South Region".to_string(),
            EntityResult {
                actual: KpiBundle::empty(),
                comparison: KpiBundle::empty(),
                variance: KpiBundle::empty(),
            },
        );
        let rollup = Rollup {
            view: View::Company,
            period,
            mode: ComparisonMode::PriorPeriod,
            comparison_period: None,
            total_key: "Total Company".to_string(),
            entries,
        };

        let report = build_report(&rollup, Some(Kpi::Sales));
        assert!(report.starts_with("# KPI Roll-up: Total Company"));
        assert!(report.contains("No comparison period available."));
        assert!(report.contains("| Sales | $5,000 | - | - |"));
        assert!(report.contains("### South Region\n\nNo data reported"));
        assert!(report.contains("1. North Region $5,000\n2. South Region -"));
    }

    fn budget_rollup(calendar: &FiscalCalendar, label: &str) -> Rollup {
        let mut entries = BTreeMap::new();
        entries.insert(
            "Total Company".to_string(),
            EntityResult {
                actual: KpiBundle::empty().with(Kpi::Sales, 5000.0),
                comparison: KpiBundle::empty().with(Kpi::Sales, 4000.0),
                variance: KpiBundle::empty().with(Kpi::Sales, 1000.0),
            },
        );
        Rollup {
            view: View::Company,
            period: calendar.find_by_label(label).unwrap().clone(),
            mode: ComparisonMode::Budget,
            comparison_period: None,
            total_key: "Total Company".to_string(),
            entries,
        }
    }

    #[test]
    fn budget_header_warns_when_month_does_not_match_period() {
        let calendar = FiscalCalendar::new(2024, 2026).unwrap();

        let quarter = build_report(&budget_rollup(&calendar, "Q1 FY2026"), None);
        assert!(quarter.contains("Compared with budget for December 2025\n"));
        assert!(quarter.contains("Warning: the December 2025 budget does not line up with Q1 FY2026"));

        let aligned = build_report(&budget_rollup(&calendar, "P1 FY2024"), None);
        assert!(aligned.contains("Compared with budget for January 2024\n"));
        assert!(!aligned.contains("Warning:"));
    }
}
