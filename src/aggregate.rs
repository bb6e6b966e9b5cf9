use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::{AggregationRule, BudgetRecord, Kpi, KpiBundle, WeeklyPerformanceRecord};

/// Reduce weekly records for `store_ids` into one bundle.
///
/// Sum KPIs are totalled. Average KPIs are divided by the size of the
/// store x week grid of the filtered batch, not by the number of records
/// that reported the KPI.
pub fn aggregate(records: &[WeeklyPerformanceRecord], store_ids: &HashSet<String>) -> KpiBundle {
    let filtered: Vec<&WeeklyPerformanceRecord> = records
        .iter()
        .filter(|r| store_ids.contains(&r.store_id))
        .collect();
    if filtered.is_empty() {
        return KpiBundle::empty();
    }

    let weeks: HashSet<NaiveDate> = filtered.iter().map(|r| r.week_start).collect();
    let stores: HashSet<&str> = filtered.iter().map(|r| r.store_id.as_str()).collect();
    let grid = (weeks.len() * stores.len()) as f64;

    let mut totals = KpiBundle::empty();
    for record in &filtered {
        for (kpi, value) in record.data.present() {
            let running = totals.get(kpi).unwrap_or(0.0);
            totals.set(kpi, Some(running + value));
        }
    }

    let mut bundle = KpiBundle::empty();
    for (kpi, total) in totals.present() {
        let value = match kpi.config().aggregation {
            AggregationRule::Sum => total,
            AggregationRule::Average => total / grid,
        };
        bundle.set(kpi, Some(value));
    }
    bundle
}

/// `actual - comparison` per KPI where both sides are present.
pub fn variance(actual: &KpiBundle, comparison: Option<&KpiBundle>) -> KpiBundle {
    let mut out = KpiBundle::empty();
    let Some(comparison) = comparison else {
        return out;
    };
    for kpi in Kpi::ALL {
        if let (Some(a), Some(c)) = (actual.get(kpi), comparison.get(kpi)) {
            out.set(kpi, Some(a - c));
        }
    }
    out
}

/// Roll budget targets up with the same rules as [`aggregate`], treating each
/// budget row as a single grid cell. Stores without a row drop out of both
/// the totals and the divisor.
pub fn aggregate_budgets(
    budgets: &[BudgetRecord],
    store_ids: &HashSet<String>,
    period_start: NaiveDate,
) -> KpiBundle {
    let as_records: Vec<WeeklyPerformanceRecord> = budgets
        .iter()
        .map(|b| WeeklyPerformanceRecord {
            store_id: b.store_id.clone(),
            week_start: period_start,
            data: b.targets,
        })
        .collect();
    aggregate(&as_records, store_ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn record(store: &str, week: NaiveDate, data: KpiBundle) -> WeeklyPerformanceRecord {
        WeeklyPerformanceRecord {
            store_id: store.to_string(),
            week_start: week,
            data,
        }
    }

    fn stores(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map(|a| (a - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn sums_sales_and_averages_ratios() {
        let records = vec![
            record("A", day(5), KpiBundle::empty().with(Kpi::Sales, 1000.0).with(Kpi::Sop, 0.20)),
            record("B", day(5), KpiBundle::empty().with(Kpi::Sales, 3000.0).with(Kpi::Sop, 0.10)),
        ];
        let bundle = aggregate(&records, &stores(&["A", "B"]));
        assert!(close(bundle.get(Kpi::Sales), 4000.0));
        assert!(close(bundle.get(Kpi::Sop), 0.15));
        assert_eq!(bundle.get(Kpi::PrimeCost), None);
    }

    #[test]
    fn single_record_is_returned_unchanged() {
        let data = KpiBundle::empty()
            .with(Kpi::Sales, 5400.0)
            .with(Kpi::FoodCost, 0.31)
            .with(Kpi::AvgReviews, 4.6);
        let bundle = aggregate(&[record("A", day(5), data)], &stores(&["A"]));
        assert_eq!(bundle, data);
    }

    #[test]
    fn empty_input_is_not_zero() {
        assert!(aggregate(&[], &stores(&["A"])).is_empty());

        let zeros = vec![record("A", day(5), KpiBundle::empty().with(Kpi::Sales, 0.0))];
        let bundle = aggregate(&zeros, &stores(&["A"]));
        assert_eq!(bundle.get(Kpi::Sales), Some(0.0));
    }

    #[test]
    fn filters_to_requested_stores() {
        let records = vec![
            record("A", day(5), KpiBundle::empty().with(Kpi::Sales, 10.0)),
            record("Z", day(5), KpiBundle::empty().with(Kpi::Sales, 99.0)),
        ];
        let bundle = aggregate(&records, &stores(&["A"]));
        assert_eq!(bundle.get(Kpi::Sales), Some(10.0));
        assert!(aggregate(&records, &stores(&["Q"])).is_empty());
    }

    #[test]
    fn average_divides_by_full_grid() {
        // Two stores, two weeks; B skipped labor cost in week 2.
        let records = vec![
            record("A", day(5), KpiBundle::empty().with(Kpi::LaborCost, 0.30)),
            record("A", day(12), KpiBundle::empty().with(Kpi::LaborCost, 0.30)),
            record("B", day(5), KpiBundle::empty().with(Kpi::LaborCost, 0.30)),
            record("B", day(12), KpiBundle::empty().with(Kpi::Sales, 500.0)),
        ];
        let bundle = aggregate(&records, &stores(&["A", "B"]));
        assert!(close(bundle.get(Kpi::LaborCost), 0.90 / 4.0));
        assert!(close(bundle.get(Kpi::Sales), 500.0));
    }

    #[test]
    fn variance_requires_both_sides() {
        let actual = KpiBundle::empty().with(Kpi::Sales, 100.0).with(Kpi::Sop, 0.2);
        let comparison = KpiBundle::empty().with(Kpi::Sales, 80.0);

        assert!(variance(&actual, None).is_empty());

        let v = variance(&actual, Some(&comparison));
        assert!(close(v.get(Kpi::Sales), 20.0));
        assert_eq!(v.get(Kpi::Sop), None);
    }

    #[test]
    fn zero_variance_is_present() {
        let actual = KpiBundle::empty().with(Kpi::Sales, 50.0);
        let v = variance(&actual, Some(&actual));
        assert_eq!(v.get(Kpi::Sales), Some(0.0));
    }

    #[test]
    fn budgets_skip_stores_without_rows() {
        let budgets = vec![
            BudgetRecord {
                store_id: "A".into(),
                year: 2026,
                month: 1,
                targets: KpiBundle::empty().with(Kpi::Sales, 20000.0).with(Kpi::PrimeCost, 0.60),
            },
            BudgetRecord {
                store_id: "B".into(),
                year: 2026,
                month: 1,
                targets: KpiBundle::empty().with(Kpi::Sales, 10000.0).with(Kpi::PrimeCost, 0.50),
            },
        ];
        let bundle = aggregate_budgets(&budgets, &stores(&["A", "B", "C"]), day(1));
        assert!(close(bundle.get(Kpi::Sales), 30000.0));
        assert!(close(bundle.get(Kpi::PrimeCost), 0.55));
    }
}
