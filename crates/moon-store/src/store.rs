use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Row, params};

use moon_core::{DateRange, DayRecord};

use crate::error::{Result, StoreError};
use crate::schema;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_DAYS: &str = "SELECT date, lunar_visibility, lunar_longitude, lunar_rise, lunar_set, solar_rise, solar_set
     FROM days";

pub struct Store {
    conn: Connection,
}

/// A `days` row before its text columns are parsed.
struct DayRow {
    date: String,
    lunar_visibility: f64,
    lunar_longitude: f64,
    lunar_rise: Option<String>,
    lunar_set: Option<String>,
    solar_rise: Option<String>,
    solar_set: Option<String>,
}

impl DayRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            lunar_visibility: row.get(1)?,
            lunar_longitude: row.get(2)?,
            lunar_rise: row.get(3)?,
            lunar_set: row.get(4)?,
            solar_rise: row.get(5)?,
            solar_set: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<DayRecord> {
        Ok(DayRecord {
            date: parse_date(&self.date)?,
            lunar_visibility: self.lunar_visibility,
            lunar_longitude: self.lunar_longitude,
            lunar_rise: parse_instant(self.lunar_rise.as_deref())?,
            lunar_set: parse_instant(self.lunar_set.as_deref())?,
            solar_rise: parse_instant(self.solar_rise.as_deref())?,
            solar_set: parse_instant(self.solar_set.as_deref())?,
        })
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::InvalidData(format!("bad date '{s}': {e}")))
}

fn parse_instant(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::InvalidData(format!("bad timestamp '{s}': {e}")))
    })
    .transpose()
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Days ---

    /// Upsert day records in one transaction.
    pub fn save_days(&self, records: &[DayRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO days
                 (date, lunar_visibility, lunar_longitude, lunar_rise, lunar_set, solar_rise, solar_set)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in records {
                stmt.execute(params![
                    format_date(r.date),
                    r.lunar_visibility,
                    r.lunar_longitude,
                    r.lunar_rise.map(|t| t.to_rfc3339()),
                    r.lunar_set.map(|t| t.to_rfc3339()),
                    r.solar_rise.map(|t| t.to_rfc3339()),
                    r.solar_set.map(|t| t.to_rfc3339()),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = records.len(), "saved days");
        Ok(records.len())
    }

    /// All stored records, ascending by date.
    pub fn load_days(&self) -> Result<Vec<DayRecord>> {
        let mut stmt = self.conn.prepare(&format!("{SELECT_DAYS} ORDER BY date"))?;
        let rows = stmt
            .query_map([], DayRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(DayRow::into_record).collect()
    }

    /// Stored records within `range`, ascending.
    pub fn load_range(&self, range: &DateRange) -> Result<Vec<DayRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_DAYS} WHERE date BETWEEN ?1 AND ?2 ORDER BY date"))?;
        let rows = stmt
            .query_map(
                params![format_date(range.start()), format_date(range.end())],
                DayRow::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(DayRow::into_record).collect()
    }

    /// Returns how many rows were actually deleted.
    pub fn delete_days(&self, dates: &[NaiveDate]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM days WHERE date = ?1")?;
            for date in dates {
                deleted += stmt.execute([format_date(*date)])?;
            }
        }
        tx.commit()?;
        tracing::debug!(deleted, "deleted days");
        Ok(deleted)
    }

    pub fn day_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM days", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// First and last stored date, `None` when empty.
    pub fn date_bounds(&self) -> Result<Option<DateRange>> {
        let (min, max): (Option<String>, Option<String>) =
            self.conn
                .query_row("SELECT MIN(date), MAX(date) FROM days", [], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
        match (min, max) {
            (Some(min), Some(max)) => Ok(Some(DateRange::new(parse_date(&min)?, parse_date(&max)?))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, visibility: f64) -> DayRecord {
        DayRecord {
            date,
            lunar_visibility: visibility,
            lunar_longitude: 12.5,
            lunar_rise: None,
            lunar_set: None,
            solar_rise: Some(Utc.with_ymd_and_hms(2016, 9, 3, 4, 40, 12).unwrap()),
            solar_set: Some(Utc.with_ymd_and_hms(2016, 9, 3, 17, 51, 3).unwrap()),
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let records = vec![record(date(2016, 9, 4), 0.2), record(date(2016, 9, 3), 0.1)];
        assert_eq!(store.save_days(&records).unwrap(), 2);

        let loaded = store.load_days().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], records[1], "ascending by date");
        assert_eq!(loaded[1], records[0]);
    }

    #[test]
    fn test_save_is_upsert() {
        let store = Store::open_in_memory().unwrap();
        store.save_days(&[record(date(2016, 9, 3), 0.1)]).unwrap();
        store.save_days(&[record(date(2016, 9, 3), 0.7)]).unwrap();

        assert_eq!(store.day_count().unwrap(), 1);
        assert_eq!(store.load_days().unwrap()[0].lunar_visibility, 0.7);
    }

    #[test]
    fn test_load_range() {
        let store = Store::open_in_memory().unwrap();
        let records: Vec<_> = (1..=9).map(|d| record(date(2016, 9, d), 0.1)).collect();
        store.save_days(&records).unwrap();

        let range = DateRange::new(date(2016, 9, 5), date(2016, 9, 3));
        let loaded = store.load_range(&range).unwrap();
        assert_eq!(
            loaded.iter().map(|r| r.date).collect::<Vec<_>>(),
            vec![date(2016, 9, 3), date(2016, 9, 4), date(2016, 9, 5)]
        );
    }

    #[test]
    fn test_delete_days() {
        let store = Store::open_in_memory().unwrap();
        store
            .save_days(&[record(date(2016, 9, 3), 0.1), record(date(2016, 9, 4), 0.2)])
            .unwrap();

        let deleted = store.delete_days(&[date(2016, 9, 3), date(2016, 9, 30)]).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.day_count().unwrap(), 1);
    }

    #[test]
    fn test_date_bounds() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.date_bounds().unwrap(), None);

        store
            .save_days(&[record(date(2016, 9, 30), 0.1), record(date(2016, 8, 2), 0.2)])
            .unwrap();
        assert_eq!(
            store.date_bounds().unwrap(),
            Some(DateRange::new(date(2016, 8, 2), date(2016, 9, 30)))
        );
    }

    #[test]
    fn test_corrupt_row_is_invalid_data() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO days (date, lunar_visibility, lunar_longitude) VALUES ('yesterday', 0.5, 1.0)",
                [],
            )
            .unwrap();
        assert!(matches!(store.load_days(), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_metadata() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_metadata("location").unwrap(), None);
        store.set_metadata("location", "48.137,11.575").unwrap();
        assert_eq!(
            store.get_metadata("location").unwrap(),
            Some("48.137,11.575".to_string())
        );
    }
}
