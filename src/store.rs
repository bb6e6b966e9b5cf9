use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{BudgetRecord, WeeklyPerformanceRecord};

/// Source of weekly KPI records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records whose week starts within `start..=end`, in no particular order.
    async fn fetch_weekly_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<WeeklyPerformanceRecord>>;
}

#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn fetch_budget(
        &self,
        store_id: &str,
        year: i32,
        month: u32,
    ) -> anyhow::Result<Option<BudgetRecord>>;
}

/// Both collaborators behind one handle.
pub trait KpiStore: RecordStore + BudgetStore {}

impl<T: RecordStore + BudgetStore> KpiStore for T {}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub records: Vec<WeeklyPerformanceRecord>,
    pub budgets: Vec<BudgetRecord>,
}

impl MemoryStore {
    pub fn new(records: Vec<WeeklyPerformanceRecord>, budgets: Vec<BudgetRecord>) -> Self {
        Self { records, budgets }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_weekly_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<WeeklyPerformanceRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| start <= r.week_start && r.week_start <= end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BudgetStore for MemoryStore {
    async fn fetch_budget(
        &self,
        store_id: &str,
        year: i32,
        month: u32,
    ) -> anyhow::Result<Option<BudgetRecord>> {
        Ok(self
            .budgets
            .iter()
            .find(|b| b.store_id == store_id && b.year == year && b.month == month)
            .cloned())
    }
}
