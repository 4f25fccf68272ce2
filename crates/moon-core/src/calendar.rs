use std::sync::Arc;

use chrono::NaiveDate;

use crate::calculator::{DayCalculator, Location};
use crate::date_range::{DateRange, shift};
use crate::day::Day;
use crate::engine::{EngineConfig, GenerationEngine};
use crate::error::CalendarError;
use crate::pool::CancelHandle;
use crate::progress::{GenerationState, ListenerId, ProgressListener};
use crate::records::{self, DayRecord};
use crate::scope::{Scope, range_needed_to_calculate, range_needed_to_keep_cycle};
use crate::store::DayStore;

pub type Result<T> = std::result::Result<T, CalendarError>;

/// A day series over an expected range at a given scope.
///
/// Owns the store and the engine that fills it. Queries that hand out days
/// fail while the recorded state is an in-progress state.
pub struct Calendar {
    expected: DateRange,
    scope: Scope,
    store: DayStore,
    engine: GenerationEngine,
}

impl Calendar {
    pub fn new(
        expected: DateRange,
        scope: Scope,
        calculator: Arc<dyn DayCalculator>,
        location: Location,
        config: EngineConfig,
    ) -> Self {
        Self::with_engine(expected, scope, GenerationEngine::new(calculator, location, config))
    }

    pub fn with_engine(expected: DateRange, scope: Scope, engine: GenerationEngine) -> Self {
        Self {
            expected,
            scope,
            store: DayStore::new(),
            engine,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn range_expected(&self) -> DateRange {
        self.expected
    }

    pub fn set_range_expected(&mut self, range: DateRange) {
        self.expected = range;
    }

    /// The range a generation run populates before extension.
    pub fn range_needed(&self) -> DateRange {
        range_needed_to_calculate(self.scope, &self.expected)
    }

    /// Widen the expected range to cover every stored day.
    pub fn fix_range_expected_to_include_existing_days(&mut self) {
        if let Some(covered) = self.store.covering_range() {
            self.expected = DateRange::new(
                self.expected.start().min(covered.start()),
                self.expected.end().max(covered.end()),
            );
        }
    }

    pub fn state(&self) -> GenerationState {
        self.engine.state()
    }

    pub fn percent(&self) -> f64 {
        self.engine.progress().percent()
    }

    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) -> ListenerId {
        self.engine.progress().add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.engine.progress().remove_listener(id)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.engine.cancel_handle()
    }

    pub fn engine(&self) -> &GenerationEngine {
        &self.engine
    }

    /// Insert persisted days. Later duplicates replace earlier ones.
    pub fn import_days<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = DayRecord>,
    {
        let days = records.into_iter().map(DayRecord::into_day);
        Ok(self.engine.import_days(&mut self.store, self.scope, days)?)
    }

    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let records = records::import_json(json)?;
        self.import_days(records)
    }

    /// Returns the number of newly generated days.
    pub fn start_generation(&mut self) -> Result<usize> {
        Ok(self.engine.start_generation(&mut self.store, self.scope, &self.expected)?)
    }

    /// Extend past and future to the nearest extremes and count, without
    /// generating the needed range first.
    pub fn start_extending(&mut self) -> Result<usize> {
        Ok(self.engine.start_extending(&mut self.store, &self.expected)?)
    }

    /// Evict stored days the scope doesn't need, ascending. Days after the
    /// expected range are only evicted when `also_future` is set.
    pub fn remove_overhead(&mut self, also_future: bool) -> Result<Vec<Day>> {
        self.ensure_idle()?;
        let keep = range_needed_to_keep_cycle(self.scope, &self.expected, &self.store, also_future);
        let mut removed = self.store.remove_before(keep.start());
        if also_future {
            removed.extend(self.store.remove_after(keep.end()));
        }
        tracing::debug!(%keep, removed = removed.len(), "removed overhead");
        Ok(removed)
    }

    pub fn get(&self, date: NaiveDate) -> Result<Option<&Day>> {
        self.ensure_idle()?;
        Ok(self.store.get(date))
    }

    pub fn all_days(&self) -> Result<Vec<&Day>> {
        self.ensure_idle()?;
        Ok(self.store.all())
    }

    /// Days the scope can vouch for.
    ///
    /// Day scope: every day. Phase scope: all but the first and last day.
    /// Cycle scope: from the nearest extreme day before the expected range to
    /// the nearest one after it, both included, falling back to the phase
    /// rule when one is missing. A cycle run whose extension gave up leaves
    /// that side without an extreme, so its edge days have unknown counts.
    /// `None` when the store has gaps.
    pub fn valid_days(&self) -> Result<Option<Vec<&Day>>> {
        self.ensure_idle()?;
        let (Some(first), Some(last)) = (self.store.first(), self.store.last()) else {
            return Ok(Some(Vec::new()));
        };
        if !self.store.is_complete() {
            return Ok(None);
        }
        if self.scope == Scope::Day {
            return Ok(Some(self.store.all()));
        }

        let mut lo = shift(first.date(), 1);
        let mut hi = shift(last.date(), -1);
        if self.scope == Scope::Cycle {
            let keep = range_needed_to_keep_cycle(Scope::Cycle, &self.expected, &self.store, true);
            lo = lo.max(shift(keep.start(), 1));
            hi = hi.min(shift(keep.end(), -1));
        }
        if lo > hi {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(self.store.range(lo, hi)))
    }

    /// True iff every expected date is stored.
    pub fn is_complete(&self) -> bool {
        self.store.is_complete_over(&self.expected)
    }

    /// Expected dates without a stored day.
    pub fn missing_dates(&self) -> Vec<NaiveDate> {
        self.store.missing_dates(&self.expected)
    }

    /// Days stored by the last run, ascending.
    pub fn newly_generated(&self) -> Result<Vec<&Day>> {
        self.ensure_idle()?;
        Ok(self
            .engine
            .newly_generated()
            .iter()
            .filter_map(|date| self.store.get(*date))
            .collect())
    }

    pub fn export_records(&self) -> Result<Vec<DayRecord>> {
        self.ensure_idle()?;
        Ok(self.store.iter().map(DayRecord::from_day).collect())
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(records::export_json(&self.export_records()?)?)
    }

    fn ensure_idle(&self) -> Result<()> {
        let state = self.engine.state();
        if state.is_in_progress() {
            return Err(CalendarError::InProgress(state));
        }
        Ok(())
    }
}
