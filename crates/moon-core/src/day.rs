use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::lunar::LunarPhase;

/// Rise and set instants of a body, in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiseSet {
    pub rise: DateTime<Utc>,
    pub set: DateTime<Utc>,
}

/// Raw astronomical facts of one day, as produced by a [`crate::DayCalculator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDayFacts {
    /// Illuminated fraction of the lunar disk, 0 (new) to 1 (full).
    pub lunar_visibility: f64,
    /// Ecliptic longitude of the Moon in degrees.
    pub lunar_longitude: f64,
    /// `None` if the Moon doesn't rise or set that day.
    pub lunar_rise_set: Option<RiseSet>,
    /// `None` if the Sun doesn't rise or set that day.
    pub solar_rise_set: Option<RiseSet>,
}

/// Facts that depend on neighboring days. Never persisted; always recomputed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DerivedDayFacts {
    /// Known once the day has both neighbors.
    pub phase: Option<LunarPhase>,
    /// Set by a counting pass; `None` = unknown.
    pub days_since_extreme: Option<u32>,
    /// Set by a counting pass; `None` = unknown.
    pub days_until_extreme: Option<u32>,
}

/// One calendar day: its date, raw facts and derived facts.
#[derive(Clone, Debug, PartialEq)]
pub struct Day {
    date: NaiveDate,
    pub raw: RawDayFacts,
    pub derived: DerivedDayFacts,
}

impl Day {
    pub fn new(date: NaiveDate, raw: RawDayFacts) -> Self {
        Self {
            date,
            raw,
            derived: DerivedDayFacts::default(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn phase(&self) -> Option<LunarPhase> {
        self.derived.phase
    }

    pub fn is_lunar_extreme(&self) -> bool {
        self.derived.phase.is_some_and(LunarPhase::is_lunar_extreme)
    }

    /// True once phase and both day counts are known.
    pub fn is_fully_derived(&self) -> bool {
        self.derived.phase.is_some()
            && self.derived.days_since_extreme.is_some()
            && self.derived.days_until_extreme.is_some()
    }
}
