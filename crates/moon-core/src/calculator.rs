//! The per-day computation seam.
//!
//! The engine never computes astronomy itself; it hands each missing date to
//! an injected [`DayCalculator`] running on a worker thread.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::day::RawDayFacts;

/// Observer location handed to every per-day computation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
    /// Local civil time offset from UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, utc_offset_minutes: i32) -> Self {
        Self {
            latitude,
            longitude,
            utc_offset_minutes,
        }
    }

    /// The fixed UTC offset, or UTC itself if the stored offset is out of range.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for Location {
    /// Munich, CET.
    fn default() -> Self {
        Self::new(48.137, 11.575, 60)
    }
}

#[derive(Debug, Error)]
#[error("failed to compute {date}: {message}")]
pub struct ComputeError {
    pub date: NaiveDate,
    pub message: String,
}

impl ComputeError {
    pub fn new(date: NaiveDate, message: impl Into<String>) -> Self {
        Self {
            date,
            message: message.into(),
        }
    }
}

/// Computes the raw facts of one date. Must be pure with respect to engine
/// state: it is called concurrently from worker threads in no particular order.
pub trait DayCalculator: Send + Sync {
    fn compute_day(&self, date: NaiveDate, location: &Location) -> Result<RawDayFacts, ComputeError>;
}

impl<F> DayCalculator for F
where
    F: Fn(NaiveDate, &Location) -> Result<RawDayFacts, ComputeError> + Send + Sync,
{
    fn compute_day(&self, date: NaiveDate, location: &Location) -> Result<RawDayFacts, ComputeError> {
        self(date, location)
    }
}
