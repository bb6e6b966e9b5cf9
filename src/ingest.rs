//! CSV import of weekly actuals and monthly budgets.
//!
//! Percent KPIs are stored as decimals. Values above 1.0 in a percent column
//! are read as whole-number percentages and scaled down.

use std::io::Read;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::calendar::FiscalCalendar;
use crate::models::{BudgetRecord, Kpi, KpiBundle, KpiFormat, WeeklyPerformanceRecord};
use crate::roster::Roster;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },
    #[error("line {line}: unknown store {store}")]
    UnknownStore { line: usize, store: String },
    #[error("line {line}: {date} is not the first day of a fiscal week")]
    NotAWeekStart { line: usize, date: NaiveDate },
    #[error("line {line}: month {month} is outside 1..=12")]
    InvalidMonth { line: usize, month: u32 },
}

#[derive(Debug, Deserialize)]
struct WeeklyRow {
    store_id: String,
    week_start: NaiveDate,
    sales: Option<f64>,
    sop: Option<f64>,
    prime_cost: Option<f64>,
    avg_reviews: Option<f64>,
    food_cost: Option<f64>,
    labor_cost: Option<f64>,
    variable_labor: Option<f64>,
    culinary_audit_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BudgetRow {
    store_id: String,
    year: i32,
    month: u32,
    sales: Option<f64>,
    sop: Option<f64>,
    prime_cost: Option<f64>,
    avg_reviews: Option<f64>,
    food_cost: Option<f64>,
    labor_cost: Option<f64>,
    variable_labor: Option<f64>,
    culinary_audit_score: Option<f64>,
}

pub fn normalize_percent(kpi: Kpi, value: f64) -> f64 {
    if kpi.config().format == KpiFormat::Percent && value.abs() > 1.0 {
        value / 100.0
    } else {
        value
    }
}

/// Columns in `Kpi::ALL` order.
fn bundle_from_columns(line: usize, store_id: &str, columns: [Option<f64>; 8]) -> KpiBundle {
    let mut bundle = KpiBundle::empty();
    for (kpi, value) in Kpi::ALL.into_iter().zip(columns) {
        let Some(value) = value else { continue };
        let normalized = normalize_percent(kpi, value);
        if normalized != value {
            warn!(line, store = %store_id, kpi = ?kpi, value, "scaled whole-number percentage to decimal");
        }
        bundle.set(kpi, Some(normalized));
    }
    bundle
}

pub fn read_weekly<R: Read>(
    input: R,
    calendar: &FiscalCalendar,
    roster: &Roster,
) -> Result<Vec<WeeklyPerformanceRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut records = Vec::new();

    for (idx, result) in reader.deserialize::<WeeklyRow>().enumerate() {
        let line = idx + 2;
        let row = result.map_err(|source| IngestError::Csv { line, source })?;
        if !roster.contains_store(&row.store_id) {
            return Err(IngestError::UnknownStore {
                line,
                store: row.store_id,
            });
        }
        if calendar.week_starting(row.week_start).is_none() {
            return Err(IngestError::NotAWeekStart {
                line,
                date: row.week_start,
            });
        }
        let data = bundle_from_columns(
            line,
            &row.store_id,
            [
                row.sales,
                row.sop,
                row.prime_cost,
                row.avg_reviews,
                row.food_cost,
                row.labor_cost,
                row.variable_labor,
                row.culinary_audit_score,
            ],
        );
        records.push(WeeklyPerformanceRecord {
            store_id: row.store_id,
            week_start: row.week_start,
            data,
        });
    }

    Ok(records)
}

pub fn read_budgets<R: Read>(input: R, roster: &Roster) -> Result<Vec<BudgetRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let mut budgets = Vec::new();

    for (idx, result) in reader.deserialize::<BudgetRow>().enumerate() {
        let line = idx + 2;
        let row = result.map_err(|source| IngestError::Csv { line, source })?;
        if !roster.contains_store(&row.store_id) {
            return Err(IngestError::UnknownStore {
                line,
                store: row.store_id,
            });
        }
        if !(1..=12).contains(&row.month) {
            return Err(IngestError::InvalidMonth {
                line,
                month: row.month,
            });
        }
        let targets = bundle_from_columns(
            line,
            &row.store_id,
            [
                row.sales,
                row.sop,
                row.prime_cost,
                row.avg_reviews,
                row.food_cost,
                row.labor_cost,
                row.variable_labor,
                row.culinary_audit_score,
            ],
        );
        budgets.push(BudgetRecord {
            store_id: row.store_id,
            year: row.year,
            month: row.month,
            targets,
        });
    }

    Ok(budgets)
}
