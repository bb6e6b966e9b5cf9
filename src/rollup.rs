use std::collections::{BTreeMap, HashSet};

use anyhow::Context;
use chrono::Datelike;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::{aggregate, aggregate_budgets, variance};
use crate::calendar::FiscalCalendar;
use crate::models::{
    BudgetRecord, ComparisonMode, EntityResult, Kpi, KpiBundle, Period, PeriodType, View,
    TOTAL_COMPANY,
};
use crate::roster::Roster;
use crate::store::KpiStore;

#[derive(Debug, Clone, Serialize)]
pub struct Rollup {
    pub view: View,
    pub period: Period,
    pub mode: ComparisonMode,
    pub comparison_period: Option<Period>,
    /// Entry holding the whole view's total.
    pub total_key: String,
    pub entries: BTreeMap<String, EntityResult>,
}

impl Rollup {
    pub fn total(&self) -> Option<&EntityResult> {
        self.entries.get(&self.total_key)
    }

    /// Non-total entities ordered best first for `kpi`; entities without a
    /// value go last.
    pub fn rank(&self, kpi: Kpi) -> Vec<(&str, Option<f64>)> {
        let higher_is_better = kpi.config().higher_is_better;
        let mut ranked: Vec<(&str, Option<f64>)> = self
            .entries
            .iter()
            .filter(|(name, _)| **name != self.total_key)
            .map(|(name, result)| (name.as_str(), result.actual.get(kpi)))
            .collect();
        ranked.sort_by(|a, b| match (a.1, b.1) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
                if higher_is_better {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        ranked
    }
}

/// Entities shown for a view: (name, stores). The view total comes last.
fn entities(roster: &Roster, view: &View) -> anyhow::Result<(String, Vec<(String, HashSet<String>)>)> {
    match view {
        View::Company => {
            let mut out: Vec<(String, HashSet<String>)> = roster
                .directors()
                .iter()
                .map(|d| (d.name.clone(), d.stores.iter().cloned().collect()))
                .collect();
            out.push((TOTAL_COMPANY.to_string(), roster.all_stores()));
            Ok((TOTAL_COMPANY.to_string(), out))
        }
        View::Director(name) => {
            let canonical = roster.director_name(name)?.to_string();
            let stores = roster.stores_for(name)?;
            let mut out: Vec<(String, HashSet<String>)> = stores
                .iter()
                .map(|s| (s.clone(), HashSet::from([s.clone()])))
                .collect();
            out.push((canonical.clone(), stores));
            Ok((canonical, out))
        }
    }
}

pub async fn compose<S: KpiStore + ?Sized>(
    calendar: &FiscalCalendar,
    roster: &Roster,
    store: &S,
    view: &View,
    period: &Period,
    mode: ComparisonMode,
) -> anyhow::Result<Rollup> {
    let (total_key, entities) = entities(roster, view)?;

    let records = store
        .fetch_weekly_records(period.start, period.end)
        .await
        .with_context(|| format!("failed to fetch records for {}", period.label))?;
    debug!(period = %period.label, records = records.len(), "fetched actuals");

    let comparison_period = calendar.comparison_period(period, mode).cloned();
    let comparisons: Vec<Option<KpiBundle>> = match mode {
        ComparisonMode::PriorPeriod | ComparisonMode::LastYear => match &comparison_period {
            Some(cp) => {
                let prior = store
                    .fetch_weekly_records(cp.start, cp.end)
                    .await
                    .with_context(|| format!("failed to fetch records for {}", cp.label))?;
                debug!(period = %cp.label, records = prior.len(), "fetched comparison");
                entities
                    .iter()
                    .map(|(_, stores)| Some(aggregate(&prior, stores)))
                    .collect()
            }
            None => {
                info!(period = %period.label, %mode, "no comparison period available");
                vec![None; entities.len()]
            }
        },
        ComparisonMode::Budget => {
            let budgets = fetch_budgets(store, &total_key, &entities, period).await?;
            entities
                .iter()
                .map(|(_, stores)| Some(aggregate_budgets(&budgets, stores, period.start)))
                .collect()
        }
    };

    let mut entries = BTreeMap::new();
    for ((name, stores), comparison) in entities.iter().zip(comparisons) {
        let actual = aggregate(&records, stores);
        let variance = variance(&actual, comparison.as_ref());
        entries.insert(
            name.clone(),
            EntityResult {
                actual,
                comparison: comparison.unwrap_or_default(),
                variance,
            },
        );
    }

    Ok(Rollup {
        view: view.clone(),
        period: period.clone(),
        mode,
        comparison_period,
        total_key,
        entries,
    })
}

/// Calendar (year, month) whose budget is compared with `period`: the month
/// containing the period start.
pub fn budget_month(period: &Period) -> (i32, u32) {
    (period.start.year(), period.start.month())
}

/// True when the budget month is not a fair stand-in for `period`: the
/// period is not a fiscal month, or less than half of its days fall inside
/// the budget month.
pub fn budget_misaligned(period: &Period) -> bool {
    if period.period_type != PeriodType::Month {
        return true;
    }
    let (year, month) = budget_month(period);
    let total = (period.end - period.start).num_days() + 1;
    let inside = period
        .start
        .iter_days()
        .take_while(|d| *d <= period.end)
        .filter(|d| d.year() == year && d.month() == month)
        .count() as i64;
    inside * 2 < total
}

/// Budget rows for every store in the view, keyed by the calendar month of
/// the period start.
async fn fetch_budgets<S: KpiStore + ?Sized>(
    store: &S,
    total_key: &str,
    entities: &[(String, HashSet<String>)],
    period: &Period,
) -> anyhow::Result<Vec<BudgetRecord>> {
    let (year, month) = budget_month(period);
    let mut store_ids: Vec<&String> = entities
        .iter()
        .find(|(name, _)| name == total_key)
        .map(|(_, stores)| stores.iter().collect())
        .unwrap_or_default();
    store_ids.sort();

    let mut budgets = Vec::new();
    for store_id in store_ids {
        match store
            .fetch_budget(store_id, year, month)
            .await
            .with_context(|| format!("failed to fetch budget for store {store_id}"))?
        {
            Some(budget) => budgets.push(budget),
            None => debug!(store = %store_id, year, month, "no budget row"),
        }
    }
    Ok(budgets)
}
