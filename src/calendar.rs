//! 4-4-5 fiscal calendar.
//!
//! Every fiscal year is exactly 52 weeks. Fiscal years are laid end to end
//! from a fixed anchor, so the calendar drifts roughly one day per year
//! against the Gregorian year; no 53rd week is ever inserted.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::models::{Period, PeriodKey, PeriodType};

pub const ANCHOR_FISCAL_YEAR: i32 = 2026;
pub const WEEKS_PER_YEAR: u32 = 52;
const MONTH_WEEKS: [u32; 3] = [4, 4, 5];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid fiscal year range {start}..={end}: end precedes start")]
    InvalidRange { start: i32, end: i32 },
    #[error("fiscal year {year} falls outside the supported date range")]
    OutOfRange { year: i32 },
}

/// First day (a Monday) of fiscal year 2026.
pub fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 29).unwrap_or(NaiveDate::MIN)
}

pub fn fiscal_year_start(fiscal_year: i32) -> Result<NaiveDate, CalendarError> {
    let offset_weeks =
        (i64::from(fiscal_year) - i64::from(ANCHOR_FISCAL_YEAR)) * i64::from(WEEKS_PER_YEAR);
    Duration::try_weeks(offset_weeks)
        .and_then(|offset| anchor_date().checked_add_signed(offset))
        .ok_or(CalendarError::OutOfRange { year: fiscal_year })
}

/// First and last day of a fiscal year. The last day must be representable
/// too, so every week inside the year is safe to compute.
fn fiscal_year_bounds(fiscal_year: i32) -> Result<(NaiveDate, NaiveDate), CalendarError> {
    let start = fiscal_year_start(fiscal_year)?;
    let end = start
        .checked_add_signed(Duration::weeks(i64::from(WEEKS_PER_YEAR)) - Duration::days(1))
        .ok_or(CalendarError::OutOfRange { year: fiscal_year })?;
    Ok((start, end))
}

pub fn generate_periods(start_year: i32, end_year: i32) -> Result<Vec<Period>, CalendarError> {
    if end_year < start_year {
        return Err(CalendarError::InvalidRange {
            start: start_year,
            end: end_year,
        });
    }
    fiscal_year_bounds(start_year)?;
    fiscal_year_bounds(end_year)?;

    let mut periods = Vec::new();
    for fiscal_year in start_year..=end_year {
        let (year_start, year_end) = fiscal_year_bounds(fiscal_year)?;
        periods.push(period(PeriodType::Year, fiscal_year, 1, year_start, year_end));

        let mut cursor = year_start;
        let mut week_no = 0u32;
        let mut month_no = 0u32;
        for quarter in 1..=4u32 {
            let quarter_start = cursor;
            let quarter_end = quarter_start + Duration::weeks(13) - Duration::days(1);
            periods.push(period(PeriodType::Quarter, fiscal_year, quarter, quarter_start, quarter_end));

            for weeks_in_month in MONTH_WEEKS {
                month_no += 1;
                let month_start = cursor;
                let month_end =
                    month_start + Duration::weeks(i64::from(weeks_in_month)) - Duration::days(1);
                periods.push(period(PeriodType::Month, fiscal_year, month_no, month_start, month_end));

                for _ in 0..weeks_in_month {
                    week_no += 1;
                    let week_end = cursor + Duration::days(6);
                    periods.push(period(PeriodType::Week, fiscal_year, week_no, cursor, week_end));
                    cursor += Duration::weeks(1);
                }
            }
        }
    }

    Ok(periods)
}

fn period(
    period_type: PeriodType,
    fiscal_year: i32,
    ordinal: u32,
    start: NaiveDate,
    end: NaiveDate,
) -> Period {
    let label = match period_type {
        PeriodType::Week => format!("W{ordinal} FY{fiscal_year}"),
        PeriodType::Month => format!("P{ordinal} FY{fiscal_year}"),
        PeriodType::Quarter => format!("Q{ordinal} FY{fiscal_year}"),
        PeriodType::Year => format!("FY{fiscal_year}"),
    };
    Period {
        period_type,
        label,
        start,
        end,
        fiscal_year,
        ordinal,
    }
}

/// Immutable set of generated periods, grouped by type in chronological order.
#[derive(Debug, Clone)]
pub struct FiscalCalendar {
    weeks: Vec<Period>,
    months: Vec<Period>,
    quarters: Vec<Period>,
    years: Vec<Period>,
    by_key: HashMap<PeriodKey, (PeriodType, usize)>,
}

impl FiscalCalendar {
    pub fn new(start_year: i32, end_year: i32) -> Result<Self, CalendarError> {
        let periods = generate_periods(start_year, end_year)?;

        let mut calendar = FiscalCalendar {
            weeks: Vec::new(),
            months: Vec::new(),
            quarters: Vec::new(),
            years: Vec::new(),
            by_key: HashMap::new(),
        };
        for p in periods {
            let key = p.key();
            let bucket = calendar.bucket_mut(p.period_type);
            bucket.push(p);
            let index = bucket.len() - 1;
            calendar.by_key.insert(key, (key.period_type, index));
        }
        Ok(calendar)
    }

    /// Periods of one type, oldest first. Never empty.
    pub fn of_type(&self, period_type: PeriodType) -> &[Period] {
        match period_type {
            PeriodType::Week => &self.weeks,
            PeriodType::Month => &self.months,
            PeriodType::Quarter => &self.quarters,
            PeriodType::Year => &self.years,
        }
    }

    fn bucket_mut(&mut self, period_type: PeriodType) -> &mut Vec<Period> {
        match period_type {
            PeriodType::Week => &mut self.weeks,
            PeriodType::Month => &mut self.months,
            PeriodType::Quarter => &mut self.quarters,
            PeriodType::Year => &mut self.years,
        }
    }

    pub fn get(&self, key: PeriodKey) -> Option<&Period> {
        let (period_type, index) = self.by_key.get(&key)?;
        self.of_type(*period_type).get(*index)
    }

    pub(crate) fn position(&self, period: &Period) -> Option<usize> {
        self.by_key
            .get(&period.key())
            .map(|(_, index)| *index)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Period> {
        let wanted = label.trim();
        PeriodType::ALL
            .iter()
            .flat_map(|t| self.of_type(*t))
            .find(|p| p.label.eq_ignore_ascii_case(wanted))
    }

    /// The generated Week that begins on `date`, if any.
    pub fn week_starting(&self, date: NaiveDate) -> Option<&Period> {
        self.weeks
            .binary_search_by_key(&date, |p| p.start)
            .ok()
            .map(|index| &self.weeks[index])
    }
}
