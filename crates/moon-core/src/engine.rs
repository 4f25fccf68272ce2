//! Generation and extension engine.
//!
//! A run is driven on the caller's thread: it computes the needed range,
//! fans the missing dates out to a [`WorkerPool`], merges each finished burst
//! into the [`DayStore`] and, for cycle scope, extends the stored range in
//! bursts of one date per worker until a lunar extreme is found on each side.
//! Every state change goes through [`transition`].

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::calculator::{ComputeError, DayCalculator, Location};
use crate::constants::{DEFAULT_BURST_TIMEOUT, FALLBACK_WORKERS, MAX_EXTENSION_DAYS};
use crate::date_range::{DateRange, shift};
use crate::day::Day;
use crate::derive;
use crate::error::{EngineError, InterruptReason};
use crate::pool::{BurstOutcome, CancelHandle, WorkerPool};
use crate::progress::{GenerationState, ProgressEstimator};
use crate::scope::{Direction, Scope, range_needed_to_calculate};
use crate::store::DayStore;

/// Engine tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Worker threads, and the size of every extension burst. 0 means
    /// hardware concurrency.
    pub workers: usize,
    /// Longest wait for one burst. `None` waits forever.
    pub burst_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            burst_timeout: Some(DEFAULT_BURST_TIMEOUT),
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_burst_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.burst_timeout = timeout;
        self
    }

    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_WORKERS)
    }
}

/// Inputs of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Import,
    ImportDone,
    Start,
    /// Start the extension phase directly, on whatever is stored.
    Extend,
    GenerationDone,
    ExtremeFound,
    CountingDone,
    Abort,
}

/// The state table. `None` marks an illegal transition.
pub fn transition(from: GenerationState, event: Event, scope: Scope) -> Option<GenerationState> {
    use GenerationState as S;

    let idle = !from.is_in_progress();
    match (from, event) {
        (_, Event::Import) if idle => Some(S::Importing),
        (S::Importing, Event::ImportDone) => Some(S::ImportFinished),
        (_, Event::Start) if idle => Some(S::Generating),
        (_, Event::Extend) if idle => Some(S::ExtendingPast),
        (S::Generating, Event::GenerationDone) => Some(if scope == Scope::Cycle {
            S::ExtendingPast
        } else {
            S::Finished
        }),
        (S::ExtendingPast, Event::ExtremeFound) => Some(S::ExtendingFuture),
        (S::ExtendingFuture, Event::ExtremeFound) => Some(S::Counting),
        (S::Counting, Event::CountingDone) => Some(S::Finished),
        (_, Event::Abort) if !idle => Some(S::Idle),
        _ => None,
    }
}

pub struct GenerationEngine {
    calculator: Arc<dyn DayCalculator>,
    location: Location,
    config: EngineConfig,
    progress: Arc<ProgressEstimator>,
    cancel: CancelHandle,
    newly_generated: Vec<NaiveDate>,
}

impl GenerationEngine {
    pub fn new(calculator: Arc<dyn DayCalculator>, location: Location, config: EngineConfig) -> Self {
        Self {
            calculator,
            location,
            config,
            progress: Arc::new(ProgressEstimator::new()),
            cancel: CancelHandle::new(),
            newly_generated: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn progress(&self) -> &Arc<ProgressEstimator> {
        &self.progress
    }

    pub fn state(&self) -> GenerationState {
        self.progress.state()
    }

    /// Handle for cancelling a run from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Dates computed and stored by the last run, ascending.
    pub fn newly_generated(&self) -> &[NaiveDate] {
        &self.newly_generated
    }

    /// Insert pre-computed days without touching the worker pool, then
    /// re-derive phases over the whole store (and day counts for cycle
    /// scope). Returns the number of days inserted.
    pub fn import_days<I>(
        &mut self,
        store: &mut DayStore,
        scope: Scope,
        days: I,
    ) -> Result<usize, EngineError>
    where
        I: IntoIterator<Item = Day>,
    {
        self.begin(Event::Import, scope)?;
        self.fire(Event::Import, scope)?;

        let mut imported = 0;
        for day in days {
            store.insert(day);
            imported += 1;
        }
        store.update_lunar_phases();
        if scope == Scope::Cycle {
            store.count_days_to_extremes();
        }

        self.fire(Event::ImportDone, scope)?;
        tracing::info!(imported, stored = store.len(), "import finished");
        Ok(imported)
    }

    /// Generate every missing date the scope needs around `expected`, then
    /// extend and count for cycle scope. Returns the number of newly
    /// generated days.
    ///
    /// On timeout or cancellation whatever completed is still merged and the
    /// state returns to [`GenerationState::Idle`].
    ///
    /// For cycle scope, a side with no extreme within
    /// [`MAX_EXTENSION_DAYS`] is given up with a warning. The run still ends
    /// in `Finished`, but days toward that side keep unknown counts.
    pub fn start_generation(
        &mut self,
        store: &mut DayStore,
        scope: Scope,
        expected: &DateRange,
    ) -> Result<usize, EngineError> {
        self.begin(Event::Start, scope)?;
        let result = self.generate(store, scope, expected);
        self.finish(store, scope, result)
    }

    /// Run only the extension and counting phases on the current store.
    pub fn start_extending(&mut self, store: &mut DayStore, expected: &DateRange) -> Result<usize, EngineError> {
        self.begin(Event::Extend, Scope::Cycle)?;
        let result = self.extend_and_count(store, expected, Event::Extend);
        self.finish(store, Scope::Cycle, result)
    }

    fn begin(&mut self, event: Event, scope: Scope) -> Result<(), EngineError> {
        let from = self.progress.state();
        if transition(from, event, scope).is_none() {
            return Err(EngineError::IllegalTransition { from, event });
        }
        self.cancel.clear();
        self.newly_generated.clear();
        self.progress.reset();
        Ok(())
    }

    fn fire(&self, event: Event, scope: Scope) -> Result<GenerationState, EngineError> {
        let from = self.progress.state();
        let to = transition(from, event, scope).ok_or(EngineError::IllegalTransition { from, event })?;
        tracing::debug!(%from, ?event, %to, "transition");
        self.progress.set_state(to);
        Ok(to)
    }

    fn finish(
        &mut self,
        store: &mut DayStore,
        scope: Scope,
        result: Result<(), EngineError>,
    ) -> Result<usize, EngineError> {
        self.newly_generated.sort_unstable();
        match result {
            Ok(()) => {
                tracing::info!(
                    generated = self.newly_generated.len(),
                    stored = store.len(),
                    "generation finished"
                );
                Ok(self.newly_generated.len())
            }
            Err(err) => {
                store.update_lunar_phases();
                if let Err(abort) = self.fire(Event::Abort, scope) {
                    tracing::error!(error = %abort, "could not abort run");
                }
                tracing::warn!(error = %err, kept = self.newly_generated.len(), "generation stopped early");
                Err(err)
            }
        }
    }

    fn generate(&mut self, store: &mut DayStore, scope: Scope, expected: &DateRange) -> Result<(), EngineError> {
        self.fire(Event::Start, scope)?;

        let needed = range_needed_to_calculate(scope, expected);
        let missing = store.missing_dates(&needed);
        self.progress.add_to_generate(missing.len() as u64);
        self.progress.estimate_extensions(scope, store);
        tracing::debug!(%needed, missing = missing.len(), %scope, "generating");

        if !missing.is_empty() {
            let pool = self.pool()?;
            let (days, outcome) = self.dispatch(&pool, missing);
            for day in days {
                self.newly_generated.push(day.date());
                store.insert(day);
            }
            store.update_lunar_phases();
            check(outcome)?;
        } else {
            store.update_lunar_phases();
        }

        if self.fire(Event::GenerationDone, scope)? == GenerationState::Finished {
            return Ok(());
        }
        self.extend_and_count(store, expected, Event::GenerationDone)
    }

    fn extend_and_count(
        &mut self,
        store: &mut DayStore,
        expected: &DateRange,
        entered_by: Event,
    ) -> Result<(), EngineError> {
        if entered_by == Event::Extend {
            self.progress.estimate_extensions(Scope::Cycle, store);
            self.fire(Event::Extend, Scope::Cycle)?;
        }

        // Spawned lazily: no threads when both extremes are already stored.
        let mut pool = None;
        self.extend(&mut pool, store, expected, Direction::Past)?;
        self.fire(Event::ExtremeFound, Scope::Cycle)?;
        self.extend(&mut pool, store, expected, Direction::Future)?;
        self.fire(Event::ExtremeFound, Scope::Cycle)?;

        store.update_lunar_phases();
        store.count_days_to_extremes();
        self.fire(Event::CountingDone, Scope::Cycle)?;
        Ok(())
    }

    /// Grow one side of the store until the extension cache holds a lunar
    /// extreme, then merge the cache into the store.
    ///
    /// The cache starts as a copy of the stored days outside `expected` on
    /// that side (boundary included). Each burst computes the next `workers`
    /// dates beyond the cache; failed dates aren't retried.
    fn extend(
        &mut self,
        pool: &mut Option<WorkerPool>,
        store: &mut DayStore,
        expected: &DateRange,
        direction: Direction,
    ) -> Result<(), EngineError> {
        let mut cache: BTreeMap<NaiveDate, Day> = match (direction, store.first(), store.last()) {
            (Direction::Past, Some(first), _) if first.date() <= expected.start() => {
                store.range(first.date(), expected.start())
            }
            (Direction::Future, _, Some(last)) if last.date() >= expected.end() => {
                store.range(expected.end(), last.date())
            }
            _ => Vec::new(),
        }
        .into_iter()
        .map(|d| (d.date(), d.clone()))
        .collect();

        let mut anchor = match direction {
            Direction::Past => cache.keys().next().copied().unwrap_or(expected.start()),
            Direction::Future => cache.keys().next_back().copied().unwrap_or(expected.end()),
        };

        let boundary = anchor;
        let mut bursts = 0usize;
        let mut outcome = BurstOutcome::Completed;
        while !derive::contains_lunar_extreme(cache.values()) {
            if (anchor - boundary).num_days().abs() >= MAX_EXTENSION_DAYS {
                tracing::warn!(%direction, %boundary, "no lunar extreme found, giving up");
                break;
            }
            if pool.is_none() {
                *pool = Some(self.pool()?);
            }
            let Some(pool) = pool.as_ref() else {
                break;
            };
            let width = pool.size() as i64;
            let next = shift(anchor, direction.step() * width);
            if next == anchor {
                tracing::warn!(%direction, %anchor, "reached the end of the calendar");
                break;
            }
            let mut dates: Vec<NaiveDate> = (1..=width)
                .map(|i| shift(anchor, direction.step() * i))
                .filter(|d| *d != anchor)
                .collect();
            dates.dedup();
            anchor = next;
            bursts += 1;

            tracing::debug!(%direction, burst = bursts, %anchor, "extension burst");
            self.progress.add_to_generate(dates.len() as u64);
            let (days, burst_outcome) = self.dispatch(pool, dates);
            for day in days {
                cache.insert(day.date(), day);
            }
            derive::update_lunar_phases(cache.values_mut());

            outcome = burst_outcome;
            if outcome != BurstOutcome::Completed {
                break;
            }
        }

        let mut merged = 0usize;
        for (date, day) in cache {
            if !store.contains(date) {
                store.insert(day);
                self.newly_generated.push(date);
                merged += 1;
            }
        }
        tracing::debug!(%direction, bursts, merged, "extension cache saved");
        check(outcome)
    }

    fn pool(&self) -> Result<WorkerPool, EngineError> {
        WorkerPool::new(self.config.resolved_workers(), self.cancel.clone())
    }

    /// Compute `dates` as one burst. Returns whatever completed, even when
    /// the burst was interrupted.
    fn dispatch(&self, pool: &WorkerPool, dates: Vec<NaiveDate>) -> (Vec<Day>, BurstOutcome) {
        let sink: Arc<Mutex<Vec<Day>>> = Arc::new(Mutex::new(Vec::with_capacity(dates.len())));
        let run = self.progress.run_id();
        let tasks: Vec<_> = dates
            .into_iter()
            .map(|date| {
                let calculator = Arc::clone(&self.calculator);
                let progress = Arc::clone(&self.progress);
                let sink = Arc::clone(&sink);
                let location = self.location;
                move || {
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| calculator.compute_day(date, &location)))
                            .unwrap_or_else(|_| Err(ComputeError::new(date, "calculator panicked")));
                    match result {
                        Ok(raw) => sink.lock().push(Day::new(date, raw)),
                        Err(err) => tracing::error!(%date, error = %err, "day computation failed"),
                    }
                    progress.on_day_generated(run);
                }
            })
            .collect();

        let outcome = pool.run_burst(tasks, self.config.burst_timeout);
        let days = std::mem::take(&mut *sink.lock());
        (days, outcome)
    }
}

fn check(outcome: BurstOutcome) -> Result<(), EngineError> {
    match outcome {
        BurstOutcome::Completed => Ok(()),
        BurstOutcome::TimedOut => Err(EngineError::Interrupted(InterruptReason::TimedOut)),
        BurstOutcome::Cancelled => Err(EngineError::Interrupted(InterruptReason::Cancelled)),
    }
}
