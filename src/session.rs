use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::calendar::FiscalCalendar;
use crate::models::{ComparisonMode, Period, View};
use crate::rollup::{compose, Rollup};
use crate::roster::Roster;
use crate::store::KpiStore;

/// Serializes roll-up requests so only the most recently issued one is
/// delivered. Responses to superseded requests are dropped.
pub struct RollupSession<'a, S: KpiStore + ?Sized> {
    calendar: &'a FiscalCalendar,
    roster: &'a Roster,
    store: &'a S,
    latest: AtomicU64,
}

impl<'a, S: KpiStore + ?Sized> RollupSession<'a, S> {
    pub fn new(calendar: &'a FiscalCalendar, roster: &'a Roster, store: &'a S) -> Self {
        Self {
            calendar,
            roster,
            store,
            latest: AtomicU64::new(0),
        }
    }

    /// Runs one selection. Returns `Ok(None)` when a newer request was issued
    /// while this one was in flight.
    pub async fn request(
        &self,
        view: &View,
        period: &Period,
        mode: ComparisonMode,
    ) -> anyhow::Result<Option<Rollup>> {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let rollup = compose(self.calendar, self.roster, self.store, view, period, mode).await?;

        let latest = self.latest.load(Ordering::SeqCst);
        if id != latest {
            debug!(request = id, latest, period = %period.label, "discarding stale roll-up");
            return Ok(None);
        }
        Ok(Some(rollup))
    }
}
