//! Scope arithmetic: which dates must be stored for a detail level, and which
//! may be evicted.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date_range::{DateRange, shift};
use crate::store::DayStore;

/// Caller-declared detail level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the expected range.
    Day,
    /// One extra day on each side so every expected day gets a phase.
    #[default]
    Phase,
    /// Out to one day past the nearest lunar extreme on both sides.
    Cycle,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Day => "day",
            Scope::Phase => "phase",
            Scope::Cycle => "cycle",
        };
        f.write_str(s)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Scope::Day),
            "phase" => Ok(Scope::Phase),
            "cycle" => Ok(Scope::Cycle),
            other => Err(format!("unknown scope '{other}' (expected day, phase or cycle)")),
        }
    }
}

/// Walking direction relative to the expected range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Past,
    Future,
}

impl Direction {
    pub fn step(self) -> i64 {
        match self {
            Direction::Past => -1,
            Direction::Future => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Past => f.write_str("past"),
            Direction::Future => f.write_str("future"),
        }
    }
}

/// The range generation must populate before the expected range is usable.
///
/// Cycle scope only gets the phase padding here; the rest depends on data and
/// is found by extension.
pub fn range_needed_to_calculate(scope: Scope, expected: &DateRange) -> DateRange {
    match scope {
        Scope::Day => *expected,
        Scope::Phase | Scope::Cycle => expected.padded(1),
    }
}

/// The range that must survive eviction.
///
/// For cycle scope the past bound is found with [`find_next_lunar_extreme`]
/// from the expected start; the future bound likewise when `evict_future` is
/// set, otherwise it stays one day after the expected end.
pub fn range_needed_to_keep_cycle(
    scope: Scope,
    expected: &DateRange,
    store: &DayStore,
    evict_future: bool,
) -> DateRange {
    match scope {
        Scope::Day => *expected,
        Scope::Phase => expected.padded(1),
        Scope::Cycle => {
            let start = find_next_lunar_extreme(store, expected.start(), Direction::Past);
            let end = if evict_future {
                find_next_lunar_extreme(store, expected.end(), Direction::Future)
            } else {
                shift(expected.end(), 1)
            };
            DateRange::new(start, end)
        }
    }
}

/// Walk the store from `start` in `direction` until a day with a known
/// extreme phase, and return the date one step beyond it.
///
/// The walk also stops at the first missing date or the first day with an
/// unknown phase; the last day visited is returned then, so the caller can
/// keep or extend from there. If `start` itself isn't stored it is returned
/// unchanged.
pub fn find_next_lunar_extreme(store: &DayStore, start: NaiveDate, direction: Direction) -> NaiveDate {
    if !store.contains(start) {
        return start;
    }

    let mut last_seen = start;
    let mut date = start;
    while let Some(day) = store.get(date) {
        last_seen = date;
        match day.phase() {
            Some(phase) if phase.is_lunar_extreme() => {
                return shift(date, direction.step());
            }
            Some(_) => {}
            None => break,
        }
        let next = shift(date, direction.step());
        if next == date {
            break;
        }
        date = next;
    }

    tracing::trace!(%start, %direction, %last_seen, "no lunar extreme in stored days");
    last_seen
}
