use chrono::NaiveDate;

use crate::calendar::FiscalCalendar;
use crate::models::{ComparisonMode, Period, PeriodKey, PeriodType};

impl FiscalCalendar {
    /// The period of the same type immediately before `period`.
    pub fn previous_period(&self, period: &Period) -> Option<&Period> {
        let index = self.position(period)?;
        let previous = index.checked_sub(1)?;
        self.of_type(period.period_type).get(previous)
    }

    /// Same type and position within the fiscal year, one fiscal year back.
    pub fn year_over_year_period(&self, period: &Period) -> Option<&Period> {
        self.get(PeriodKey {
            fiscal_year: period.fiscal_year - 1,
            ..period.key()
        })
    }

    /// The period of `period_type` containing `now`, or the last generated
    /// one when `now` lies outside the calendar.
    pub fn current_period(&self, now: NaiveDate, period_type: PeriodType) -> &Period {
        let periods = self.of_type(period_type);
        periods
            .iter()
            .find(|p| p.contains(now))
            .unwrap_or(&periods[periods.len() - 1])
    }

    /// Period whose records feed the comparison column. Budget comparisons
    /// have no comparison period.
    pub fn comparison_period(&self, period: &Period, mode: ComparisonMode) -> Option<&Period> {
        match mode {
            ComparisonMode::PriorPeriod => self.previous_period(period),
            ComparisonMode::LastYear => self.year_over_year_period(period),
            ComparisonMode::Budget => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::calendar::anchor_date;

    fn calendar() -> FiscalCalendar {
        FiscalCalendar::new(2025, 2027).unwrap()
    }

    #[test]
    fn first_period_has_no_previous() {
        let calendar = calendar();
        for t in PeriodType::ALL {
            let first = &calendar.of_type(t)[0];
            assert!(calendar.previous_period(first).is_none(), "{t:?}");
        }
    }

    #[test]
    fn previous_ends_the_day_before() {
        let calendar = calendar();
        for t in PeriodType::ALL {
            for p in calendar.of_type(t).iter().skip(1) {
                let previous = calendar.previous_period(p).unwrap();
                assert_eq!(previous.period_type, t);
                assert_eq!(previous.end + Duration::days(1), p.start);
            }
        }
    }

    #[test]
    fn previous_crosses_fiscal_years() {
        let calendar = calendar();
        let p1 = calendar.find_by_label("P1 FY2026").unwrap();
        assert_eq!(calendar.previous_period(p1).unwrap().label, "P12 FY2025");
    }

    #[test]
    fn year_over_year_swaps_only_the_year() {
        let calendar = calendar();
        let q2 = calendar.find_by_label("Q2 FY2027").unwrap();
        let last_year = calendar.year_over_year_period(q2).unwrap();
        assert_eq!(last_year.label, "Q2 FY2026");
        assert_eq!(last_year.period_type, q2.period_type);
        assert_eq!(last_year.ordinal, q2.ordinal);

        let w10 = calendar.find_by_label("W10 FY2025").unwrap();
        assert!(calendar.year_over_year_period(w10).is_none());
    }

    #[test]
    fn current_period_contains_now_or_falls_back() {
        let calendar = calendar();
        let now = anchor_date() + Duration::days(40);
        let month = calendar.current_period(now, PeriodType::Month);
        assert_eq!(month.label, "P2 FY2026");
        assert!(month.contains(now));

        let far_future = NaiveDate::from_ymd_opt(2040, 1, 1).unwrap();
        let fallback = calendar.current_period(far_future, PeriodType::Quarter);
        assert_eq!(fallback.label, "Q4 FY2027");
    }

    #[test]
    fn comparison_period_by_mode() {
        let calendar = calendar();
        let p5 = calendar.find_by_label("P5 FY2026").unwrap();
        assert_eq!(
            calendar
                .comparison_period(p5, ComparisonMode::PriorPeriod)
                .unwrap()
                .label,
            "P4 FY2026"
        );
        assert_eq!(
            calendar
                .comparison_period(p5, ComparisonMode::LastYear)
                .unwrap()
                .label,
            "P5 FY2025"
        );
        assert!(calendar
            .comparison_period(p5, ComparisonMode::Budget)
            .is_none());
    }
}
