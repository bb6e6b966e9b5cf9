use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::FiscalCalendar;
use crate::models::{BudgetRecord, Kpi, KpiBundle, PeriodType, WeeklyPerformanceRecord};
use crate::notes::Note;
use crate::roster::Roster;
use crate::store::{BudgetStore, RecordStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn bundle_from_row(row: &PgRow) -> Result<KpiBundle, sqlx::Error> {
    let mut bundle = KpiBundle::empty();
    for kpi in Kpi::ALL {
        bundle.set(kpi, row.try_get::<Option<f64>, _>(column(kpi))?);
    }
    Ok(bundle)
}

fn column(kpi: Kpi) -> &'static str {
    match kpi {
        Kpi::Sales => "sales",
        Kpi::Sop => "sop",
        Kpi::PrimeCost => "prime_cost",
        Kpi::AvgReviews => "avg_reviews",
        Kpi::FoodCost => "food_cost",
        Kpi::LaborCost => "labor_cost",
        Kpi::VariableLabor => "variable_labor",
        Kpi::CulinaryAuditScore => "culinary_audit_score",
    }
}

pub async fn upsert_weekly(pool: &PgPool, records: &[WeeklyPerformanceRecord]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for record in records {
        let d = &record.data;
        let result = sqlx::query(
            r#"
            INSERT INTO kpi_dashboard.weekly_performance
            (store_id, week_start, sales, sop, prime_cost, avg_reviews,
             food_cost, labor_cost, variable_labor, culinary_audit_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (store_id, week_start) DO UPDATE
            SET sales = EXCLUDED.sales,
                sop = EXCLUDED.sop,
                prime_cost = EXCLUDED.prime_cost,
                avg_reviews = EXCLUDED.avg_reviews,
                food_cost = EXCLUDED.food_cost,
                labor_cost = EXCLUDED.labor_cost,
                variable_labor = EXCLUDED.variable_labor,
                culinary_audit_score = EXCLUDED.culinary_audit_score,
                updated_at = now()
            "#,
        )
        .bind(&record.store_id)
        .bind(record.week_start)
        .bind(d.get(Kpi::Sales))
        .bind(d.get(Kpi::Sop))
        .bind(d.get(Kpi::PrimeCost))
        .bind(d.get(Kpi::AvgReviews))
        .bind(d.get(Kpi::FoodCost))
        .bind(d.get(Kpi::LaborCost))
        .bind(d.get(Kpi::VariableLabor))
        .bind(d.get(Kpi::CulinaryAuditScore))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to write {} week {}", record.store_id, record.week_start))?;

        written += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(written)
}

pub async fn upsert_budget(pool: &PgPool, budgets: &[BudgetRecord]) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for budget in budgets {
        let t = &budget.targets;
        let result = sqlx::query(
            r#"
            INSERT INTO kpi_dashboard.budgets
            (store_id, year, month, sales, sop, prime_cost, avg_reviews,
             food_cost, labor_cost, variable_labor, culinary_audit_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (store_id, year, month) DO UPDATE
            SET sales = EXCLUDED.sales,
                sop = EXCLUDED.sop,
                prime_cost = EXCLUDED.prime_cost,
                avg_reviews = EXCLUDED.avg_reviews,
                food_cost = EXCLUDED.food_cost,
                labor_cost = EXCLUDED.labor_cost,
                variable_labor = EXCLUDED.variable_labor,
                culinary_audit_score = EXCLUDED.culinary_audit_score
            "#,
        )
        .bind(&budget.store_id)
        .bind(budget.year)
        .bind(budget.month as i32)
        .bind(t.get(Kpi::Sales))
        .bind(t.get(Kpi::Sop))
        .bind(t.get(Kpi::PrimeCost))
        .bind(t.get(Kpi::AvgReviews))
        .bind(t.get(Kpi::FoodCost))
        .bind(t.get(Kpi::LaborCost))
        .bind(t.get(Kpi::VariableLabor))
        .bind(t.get(Kpi::CulinaryAuditScore))
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "failed to write budget {} {}-{:02}",
                budget.store_id, budget.year, budget.month
            )
        })?;

        written += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(written)
}

/// Deterministic demo data: every store, every week of the current fiscal
/// month and of the same month last year, plus budgets for the calendar
/// month the current fiscal month starts in.
pub fn sample_data(
    calendar: &FiscalCalendar,
    roster: &Roster,
    today: NaiveDate,
) -> (Vec<WeeklyPerformanceRecord>, Vec<BudgetRecord>) {
    let month = calendar.current_period(today, PeriodType::Month);
    let mut months = vec![(month, 1.0)];
    if let Some(last_year) = calendar.year_over_year_period(month) {
        months.push((last_year, 0.93));
    }

    let stores: Vec<String> = roster.sorted_stores().into_iter().collect();
    let mut records = Vec::new();
    for (period, growth) in months {
        let mut week = period.start;
        let mut w = 0.0;
        while week <= period.end {
            for (i, store_id) in stores.iter().enumerate() {
                let i = i as f64;
                records.push(WeeklyPerformanceRecord {
                    store_id: store_id.clone(),
                    week_start: week,
                    data: KpiBundle::empty()
                        .with(Kpi::Sales, ((38_000.0 + 2_500.0 * i + 600.0 * w) * growth).round())
                        .with(Kpi::Sop, 0.17 + 0.004 * i)
                        .with(Kpi::PrimeCost, 0.61 - 0.003 * i)
                        .with(Kpi::AvgReviews, 4.2 + 0.05 * (i % 4.0))
                        .with(Kpi::FoodCost, 0.29 + 0.002 * w)
                        .with(Kpi::LaborCost, 0.31 - 0.002 * i)
                        .with(Kpi::VariableLabor, 0.14 + 0.001 * i)
                        .with(Kpi::CulinaryAuditScore, 0.88 + 0.01 * (i % 3.0)),
                });
            }
            week += Duration::weeks(1);
            w += 1.0;
        }
    }

    let budgets = stores
        .iter()
        .enumerate()
        .map(|(i, store_id)| BudgetRecord {
            store_id: store_id.clone(),
            year: month.start.year(),
            month: month.start.month(),
            targets: KpiBundle::empty()
                .with(Kpi::Sales, 160_000.0 + 10_000.0 * i as f64)
                .with(Kpi::Sop, 0.18)
                .with(Kpi::PrimeCost, 0.60)
                .with(Kpi::FoodCost, 0.29)
                .with(Kpi::LaborCost, 0.30),
        })
        .collect();

    (records, budgets)
}

pub async fn seed(pool: &PgPool, calendar: &FiscalCalendar, roster: &Roster, today: NaiveDate) -> anyhow::Result<()> {
    let (records, budgets) = sample_data(calendar, roster, today);
    let weekly = upsert_weekly(pool, &records).await?;
    let budget_rows = upsert_budget(pool, &budgets).await?;
    info!(weekly, budgets = budget_rows, "seed data written");
    Ok(())
}

pub async fn add_note(
    pool: &PgPool,
    period_label: &str,
    store_id: Option<&str>,
    body: &str,
) -> anyhow::Result<Note> {
    let row = sqlx::query(
        r#"
        INSERT INTO kpi_dashboard.notes (id, period_label, store_id, body)
        VALUES ($1, $2, $3, $4)
        RETURNING id, period_label, store_id, body, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(period_label)
    .bind(store_id)
    .bind(body)
    .fetch_one(pool)
    .await?;

    Ok(Note {
        id: row.get("id"),
        period_label: row.get("period_label"),
        store_id: row.get("store_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
    })
}

pub async fn list_notes(pool: &PgPool, period_label: Option<&str>) -> anyhow::Result<Vec<Note>> {
    let mut query = String::from(
        "SELECT id, period_label, store_id, body, created_at FROM kpi_dashboard.notes",
    );
    if period_label.is_some() {
        query.push_str(" WHERE lower(period_label) = lower($1)");
    }
    query.push_str(" ORDER BY created_at DESC");

    let mut rows = sqlx::query(&query);
    if let Some(label) = period_label {
        rows = rows.bind(label);
    }

    let mut notes = Vec::new();
    for row in rows.fetch_all(pool).await? {
        notes.push(Note {
            id: row.get("id"),
            period_label: row.get("period_label"),
            store_id: row.get("store_id"),
            body: row.get("body"),
            created_at: row.get("created_at"),
        });
    }
    Ok(notes)
}

/// Postgres-backed record and budget store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch_weekly_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<WeeklyPerformanceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT store_id, week_start, sales, sop, prime_cost, avg_reviews,
                   food_cost, labor_cost, variable_labor, culinary_audit_score
            FROM kpi_dashboard.weekly_performance
            WHERE week_start BETWEEN $1 AND $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(WeeklyPerformanceRecord {
                store_id: row.try_get("store_id")?,
                week_start: row.try_get("week_start")?,
                data: bundle_from_row(&row)?,
            });
        }
        debug!(%start, %end, records = records.len(), "loaded weekly records");
        Ok(records)
    }
}

#[async_trait]
impl BudgetStore for PgStore {
    async fn fetch_budget(
        &self,
        store_id: &str,
        year: i32,
        month: u32,
    ) -> anyhow::Result<Option<BudgetRecord>> {
        let row = sqlx::query(
            r#"
            SELECT store_id, year, month, sales, sop, prime_cost, avg_reviews,
                   food_cost, labor_cost, variable_labor, culinary_audit_score
            FROM kpi_dashboard.budgets
            WHERE store_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(store_id)
        .bind(year)
        .bind(month as i32)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let month: i32 = row.try_get("month")?;
        Ok(Some(BudgetRecord {
            store_id: row.try_get("store_id")?,
            year: row.try_get("year")?,
            month: u32::try_from(month).context("negative budget month")?,
            targets: bundle_from_row(&row)?,
        }))
    }
}
