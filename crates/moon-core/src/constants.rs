use std::time::Duration;

/// Approximate number of days between two lunar extremes (half a synodic month,
/// rounded up). Used only to pad progress estimates for extension work.
pub const APPROXIMATE_CYCLE_LENGTH: u64 = 17;

/// Upper bound for progress reported from per-day ticks. Extension work may be
/// underestimated, so ticks alone never report completion.
pub const PROGRESS_TICK_CAP: f64 = 0.98;

/// Progress forced on entering the counting pass.
pub const PROGRESS_COUNTING: f64 = 0.99;

/// Progress forced on entering the finished state.
pub const PROGRESS_FINISHED: f64 = 1.0;

/// Fallback worker count when hardware concurrency cannot be queried.
pub const FALLBACK_WORKERS: usize = 4;

/// Mean synodic month in days.
pub const SYNODIC_MONTH: f64 = 29.530_588_853;

/// Julian day number of 1970-01-01T00:00:00Z.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian day number of J2000.0.
pub const J2000_JD: f64 = 2_451_545.0;

/// Default wait for a single burst before the engine gives up. `None` in
/// [`crate::EngineConfig`] waits forever.
pub const DEFAULT_BURST_TIMEOUT: Duration = Duration::from_secs(60);

/// Extension gives up after searching this many days past the stored boundary
/// without finding an extreme. Two synodic months.
pub const MAX_EXTENSION_DAYS: i64 = 60;
