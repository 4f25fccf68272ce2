//! Lunar day-series generation engine.
//!
//! Maintains a date-indexed series of per-day lunar facts over an expected
//! range, widened as far as the requested [`Scope`] needs: one day of padding
//! for phases, or out to the nearest full or new moon on both sides for day
//! counts. Per-day astronomy is an injected [`DayCalculator`] run on a bounded
//! worker pool.
//!
//! No I/O apart from logging and worker threads.

pub mod calculator;
pub mod calendar;
pub mod constants;
pub mod date_range;
pub mod day;
pub mod derive;
pub mod engine;
pub mod ephemeris;
pub mod error;
pub mod lunar;
pub mod pool;
pub mod progress;
pub mod records;
pub mod scope;
pub mod store;

pub use calculator::{ComputeError, DayCalculator, Location};
pub use calendar::Calendar;
pub use constants::{APPROXIMATE_CYCLE_LENGTH, DEFAULT_BURST_TIMEOUT};
pub use date_range::{DateRange, shift};
pub use day::{Day, DerivedDayFacts, RawDayFacts, RiseSet};
pub use engine::{EngineConfig, Event, GenerationEngine, transition};
pub use ephemeris::MeanEphemeris;
pub use error::{CalendarError, EngineError, InterruptReason};
pub use lunar::LunarPhase;
pub use pool::CancelHandle;
pub use progress::{GenerationState, ListenerId, ProgressEstimator, ProgressListener, RunId};
pub use records::{CURRENT_VERSION, DayRecord, export_json, import_json};
pub use scope::{
    Direction, Scope, find_next_lunar_extreme, range_needed_to_calculate, range_needed_to_keep_cycle,
};
pub use store::DayStore;
