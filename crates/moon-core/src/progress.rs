//! Progress estimation and listener fan-out.
//!
//! The number of extension bursts a cycle run needs isn't known up front, so
//! the denominator grows as work is discovered and ticks are capped below 1.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    APPROXIMATE_CYCLE_LENGTH, PROGRESS_COUNTING, PROGRESS_FINISHED, PROGRESS_TICK_CAP,
};
use crate::scope::Scope;
use crate::store::DayStore;

/// Where a calendar is in its import or generation pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    /// No run announced yet, or the last one was interrupted.
    #[default]
    Idle,
    Importing,
    ImportFinished,
    Generating,
    ExtendingPast,
    ExtendingFuture,
    Counting,
    Finished,
}

impl GenerationState {
    /// True while the store may be mutated by a run.
    pub fn is_in_progress(self) -> bool {
        !matches!(
            self,
            GenerationState::Idle | GenerationState::ImportFinished | GenerationState::Finished
        )
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationState::Idle => "idle",
            GenerationState::Importing => "importing",
            GenerationState::ImportFinished => "import finished",
            GenerationState::Generating => "generating",
            GenerationState::ExtendingPast => "extending past",
            GenerationState::ExtendingFuture => "extending future",
            GenerationState::Counting => "counting",
            GenerationState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Receives state and progress announcements.
///
/// Called synchronously from the orchestrating thread or from a worker
/// thread, one notification at a time. Implementations may read
/// [`ProgressEstimator::state`] and [`ProgressEstimator::percent`] but must
/// not drive the estimator.
pub trait ProgressListener: Send + Sync {
    fn on_state_changed(&self, state: GenerationState);
    fn on_progress(&self, percent: f64);
}

/// Handle returned by [`ProgressEstimator::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Identifies one run of the estimator, from [`ProgressEstimator::reset`]
/// until the next resting state. Ticks carrying an older id are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunId(u64);

#[derive(Debug, Default)]
struct Counters {
    run: u64,
    to_generate: u64,
    generated: u64,
    percent: f64,
    state: GenerationState,
}

#[derive(Clone, Copy)]
enum Notice {
    State(GenerationState, f64),
    Progress(f64),
}

#[derive(Default)]
pub struct ProgressEstimator {
    counters: Mutex<Counters>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ProgressListener>)>>,
    // Held across a counter update and its notification so listeners see
    // announcements in the order they happened.
    dispatch: Mutex<()>,
    next_id: AtomicU64,
}

impl fmt::Debug for ProgressEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressEstimator")
            .field("counters", &*self.counters.lock())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns false if `id` wasn't registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn state(&self) -> GenerationState {
        self.counters.lock().state
    }

    pub fn percent(&self) -> f64 {
        self.counters.lock().percent
    }

    pub fn days_to_generate(&self) -> u64 {
        self.counters.lock().to_generate
    }

    pub fn days_generated(&self) -> u64 {
        self.counters.lock().generated
    }

    /// The current run. Tasks capture it when dispatched.
    pub fn run_id(&self) -> RunId {
        RunId(self.counters.lock().run)
    }

    /// Zero both counters and announce [`GenerationState::Idle`], so the next
    /// state set always notifies.
    pub fn reset(&self) {
        let _dispatch = self.dispatch.lock();
        {
            let mut c = self.counters.lock();
            *c = Counters {
                run: c.run.wrapping_add(1),
                ..Counters::default()
            };
        }
        self.notify(Notice::State(GenerationState::Idle, 0.0));
    }

    /// Pad the denominator for extension work that is likely to come.
    ///
    /// A direction is likely to need extension unless the store's second (or
    /// second-to-last) day is already a known extreme. Stores too short to
    /// carry a phase count as both directions. Each likely direction rounds
    /// the denominator up to the next multiple of the approximate cycle
    /// length.
    pub fn estimate_extensions(&self, scope: Scope, store: &DayStore) {
        if scope != Scope::Cycle {
            return;
        }

        let directions = if store.len() < 3 {
            2
        } else {
            let second = store.iter().nth(1).is_some_and(|d| d.is_lunar_extreme());
            let second_to_last = store.iter().rev().nth(1).is_some_and(|d| d.is_lunar_extreme());
            u8::from(!second) + u8::from(!second_to_last)
        };

        let mut c = self.counters.lock();
        for _ in 0..directions {
            c.to_generate += APPROXIMATE_CYCLE_LENGTH - (c.to_generate % APPROXIMATE_CYCLE_LENGTH);
        }
        tracing::debug!(directions, to_generate = c.to_generate, "estimated extension work");
    }

    /// Grow the denominator by a burst about to be dispatched.
    pub fn add_to_generate(&self, days: u64) {
        self.counters.lock().to_generate += days;
    }

    /// Count one finished (or failed) day of `run` and announce the new
    /// percent. Ticks from a run that already ended are ignored.
    ///
    /// Percent never decreases within a run and stays at or below the tick cap.
    pub fn on_day_generated(&self, run: RunId) {
        let _dispatch = self.dispatch.lock();
        let percent = {
            let mut c = self.counters.lock();
            if c.run != run.0 {
                tracing::trace!(stale = run.0, current = c.run, "dropped tick from an ended run");
                return;
            }
            c.generated += 1;
            let ratio = if c.to_generate == 0 {
                0.0
            } else {
                c.generated as f64 / c.to_generate as f64
            };
            c.percent = c.percent.max(ratio.min(PROGRESS_TICK_CAP));
            c.percent
        };
        self.notify(Notice::Progress(percent));
    }

    /// Announce a new state. No-op if unchanged.
    pub fn set_state(&self, state: GenerationState) {
        let _dispatch = self.dispatch.lock();
        let percent = {
            let mut c = self.counters.lock();
            if c.state == state {
                return;
            }
            c.state = state;
            if !state.is_in_progress() {
                c.run = c.run.wrapping_add(1);
            }
            match state {
                GenerationState::Counting => c.percent = PROGRESS_COUNTING,
                GenerationState::Finished | GenerationState::ImportFinished => {
                    c.percent = PROGRESS_FINISHED
                }
                _ => {}
            }
            c.percent
        };
        tracing::debug!(%state, percent, "state changed");
        self.notify(Notice::State(state, percent));
    }

    fn notify(&self, notice: Notice) {
        let listeners: Vec<Arc<dyn ProgressListener>> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            match notice {
                Notice::State(state, percent) => {
                    listener.on_state_changed(state);
                    listener.on_progress(percent);
                }
                Notice::Progress(percent) => listener.on_progress(percent),
            }
        }
    }
}
