use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Kpi {
    Sales,
    #[serde(rename = "SOP")]
    Sop,
    PrimeCost,
    AvgReviews,
    FoodCost,
    LaborCost,
    VariableLabor,
    CulinaryAuditScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiFormat {
    Currency,
    Percent,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationRule {
    Sum,
    /// Averaged over the store x week grid of the filtered batch.
    Average,
}

#[derive(Debug, Clone, Copy)]
pub struct KpiConfig {
    pub format: KpiFormat,
    pub higher_is_better: bool,
    pub aggregation: AggregationRule,
}

impl Kpi {
    pub const ALL: [Kpi; 8] = [
        Kpi::Sales,
        Kpi::Sop,
        Kpi::PrimeCost,
        Kpi::AvgReviews,
        Kpi::FoodCost,
        Kpi::LaborCost,
        Kpi::VariableLabor,
        Kpi::CulinaryAuditScore,
    ];

    pub fn config(self) -> KpiConfig {
        use AggregationRule::*;
        use KpiFormat::*;
        let (format, higher_is_better, aggregation) = match self {
            Kpi::Sales => (Currency, true, Sum),
            Kpi::Sop => (Percent, true, Average),
            Kpi::PrimeCost => (Percent, false, Average),
            Kpi::AvgReviews => (Number, true, Average),
            Kpi::FoodCost => (Percent, false, Average),
            Kpi::LaborCost => (Percent, false, Average),
            Kpi::VariableLabor => (Percent, false, Average),
            Kpi::CulinaryAuditScore => (Percent, true, Average),
        };
        KpiConfig {
            format,
            higher_is_better,
            aggregation,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Kpi::Sales => "Sales",
            Kpi::Sop => "SOP",
            Kpi::PrimeCost => "Prime Cost",
            Kpi::AvgReviews => "Avg Reviews",
            Kpi::FoodCost => "Food Cost",
            Kpi::LaborCost => "Labor Cost",
            Kpi::VariableLabor => "Variable Labor",
            Kpi::CulinaryAuditScore => "Culinary Audit Score",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One optional value per KPI. An absent KPI means "not reported", which is
/// distinct from a reported zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KpiBundle([Option<f64>; 8]);

impl KpiBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, kpi: Kpi) -> Option<f64> {
        self.0[kpi.index()]
    }

    pub fn set(&mut self, kpi: Kpi, value: Option<f64>) {
        self.0[kpi.index()] = value;
    }

    pub fn with(mut self, kpi: Kpi, value: f64) -> Self {
        self.set(kpi, Some(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn present(&self) -> impl Iterator<Item = (Kpi, f64)> + '_ {
        Kpi::ALL
            .iter()
            .filter_map(move |kpi| self.get(*kpi).map(|value| (*kpi, value)))
    }
}

impl Serialize for KpiBundle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<Kpi, f64> = self.present().collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KpiBundle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<Kpi, f64>::deserialize(deserializer)?;
        let mut bundle = KpiBundle::empty();
        for (kpi, value) in map {
            bundle.set(kpi, Some(value));
        }
        Ok(bundle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPerformanceRecord {
    pub store_id: String,
    pub week_start: NaiveDate,
    pub data: KpiBundle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub store_id: String,
    pub year: i32,
    pub month: u32,
    pub targets: KpiBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum PeriodType {
    Week,
    Month,
    Quarter,
    Year,
}

impl PeriodType {
    pub const ALL: [PeriodType; 4] = [
        PeriodType::Week,
        PeriodType::Month,
        PeriodType::Quarter,
        PeriodType::Year,
    ];
}

/// Structured identity of a period; labels are display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeriodKey {
    pub period_type: PeriodType,
    pub fiscal_year: i32,
    pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub period_type: PeriodType,
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub fiscal_year: i32,
    /// 1-based position within the fiscal year (week 1..=52, month 1..=12, ...).
    pub ordinal: u32,
}

impl Period {
    pub fn key(&self) -> PeriodKey {
        PeriodKey {
            period_type: self.period_type,
            fiscal_year: self.fiscal_year,
            ordinal: self.ordinal,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
pub enum ComparisonMode {
    #[value(name = "prior")]
    PriorPeriod,
    LastYear,
    Budget,
}

impl fmt::Display for ComparisonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComparisonMode::PriorPeriod => "vs. Prior Period",
            ComparisonMode::LastYear => "vs. Last Year",
            ComparisonMode::Budget => "vs. Budget",
        };
        f.write_str(label)
    }
}

pub const TOTAL_COMPANY: &str = "Total Company";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum View {
    Company,
    Director(String),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Company => f.write_str(TOTAL_COMPANY),
            View::Director(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityResult {
    pub actual: KpiBundle,
    pub comparison: KpiBundle,
    pub variance: KpiBundle,
}
