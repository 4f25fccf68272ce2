//! Flat persisted form of a day and its JSON wire format.
//!
//! Only raw facts are persisted; phases and day counts are recomputed after
//! every import. The wire format uses camelCase field names and ISO-8601
//! dates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::day::{Day, RawDayFacts, RiseSet};

pub const CURRENT_VERSION: &str = "1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    pub lunar_visibility: f64,
    pub lunar_longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunar_rise: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunar_set: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar_rise: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar_set: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireExport {
    pub version: String,
    pub days: Vec<DayRecord>,
}

fn rise_set(rise: Option<DateTime<Utc>>, set: Option<DateTime<Utc>>) -> Option<RiseSet> {
    Some(RiseSet {
        rise: rise?,
        set: set?,
    })
}

impl DayRecord {
    pub fn from_day(day: &Day) -> Self {
        Self {
            date: day.date(),
            lunar_visibility: day.raw.lunar_visibility,
            lunar_longitude: day.raw.lunar_longitude,
            lunar_rise: day.raw.lunar_rise_set.map(|rs| rs.rise),
            lunar_set: day.raw.lunar_rise_set.map(|rs| rs.set),
            solar_rise: day.raw.solar_rise_set.map(|rs| rs.rise),
            solar_set: day.raw.solar_rise_set.map(|rs| rs.set),
        }
    }

    /// A rise without a set (or the reverse) is dropped.
    pub fn into_day(self) -> Day {
        Day::new(
            self.date,
            RawDayFacts {
                lunar_visibility: self.lunar_visibility,
                lunar_longitude: self.lunar_longitude,
                lunar_rise_set: rise_set(self.lunar_rise, self.lunar_set),
                solar_rise_set: rise_set(self.solar_rise, self.solar_set),
            },
        )
    }
}

impl From<&Day> for DayRecord {
    fn from(day: &Day) -> Self {
        DayRecord::from_day(day)
    }
}

impl From<DayRecord> for Day {
    fn from(record: DayRecord) -> Self {
        record.into_day()
    }
}

/// Parse day records. Order and duplicates are kept as found.
pub fn import_json(json: &str) -> Result<Vec<DayRecord>, serde_json::Error> {
    let wire: WireExport = serde_json::from_str(json)?;
    if wire.version != CURRENT_VERSION {
        tracing::warn!(version = %wire.version, expected = CURRENT_VERSION, "unexpected day record version");
    }
    Ok(wire.days)
}

pub fn export_json(records: &[DayRecord]) -> Result<String, serde_json::Error> {
    let wire = WireExport {
        version: CURRENT_VERSION.to_string(),
        days: records.to_vec(),
    };
    serde_json::to_string_pretty(&wire)
}
