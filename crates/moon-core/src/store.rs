use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::NaiveDate;

use crate::date_range::{DateRange, shift};
use crate::day::Day;
use crate::derive;

/// Sorted, unique-by-date collection of [`Day`]s.
///
/// Days are keyed by their date; lookups take a bare date. A stored day's date
/// never changes.
#[derive(Clone, Debug, Default)]
pub struct DayStore {
    days: BTreeMap<NaiveDate, Day>,
}

impl DayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Dates of `range` without a stored day, ascending.
    pub fn missing_dates(&self, range: &DateRange) -> Vec<NaiveDate> {
        if self.days.is_empty() {
            return range.iter().collect();
        }
        range
            .iter()
            .filter(|date| !self.days.contains_key(date))
            .collect()
    }

    /// Upsert by date. Returns the replaced day, if any.
    pub fn insert(&mut self, day: Day) -> Option<Day> {
        self.days.insert(day.date(), day)
    }

    /// Evict all days strictly before `date`, ascending.
    pub fn remove_before(&mut self, date: NaiveDate) -> Vec<Day> {
        let kept = self.days.split_off(&date);
        let removed = std::mem::replace(&mut self.days, kept);
        removed.into_values().collect()
    }

    /// Evict all days strictly after `date`, ascending.
    pub fn remove_after(&mut self, date: NaiveDate) -> Vec<Day> {
        if date == NaiveDate::MAX {
            return Vec::new();
        }
        self.days
            .split_off(&shift(date, 1))
            .into_values()
            .collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Day> {
        self.days.get(&date)
    }

    pub fn get_mut(&mut self, date: NaiveDate) -> Option<&mut Day> {
        self.days.get_mut(&date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn first(&self) -> Option<&Day> {
        self.days.values().next()
    }

    pub fn last(&self) -> Option<&Day> {
        self.days.values().next_back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Day> {
        self.days.values()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Day> {
        self.days.values_mut()
    }

    /// All days, ascending.
    pub fn all(&self) -> Vec<&Day> {
        self.days.values().collect()
    }

    /// Stored days between `a` and `b` inclusive, in either order. May contain gaps.
    pub fn range(&self, a: NaiveDate, b: NaiveDate) -> Vec<&Day> {
        let r = DateRange::new(a, b);
        self.days.range(r.start()..=r.end()).map(|(_, d)| d).collect()
    }

    pub fn range_mut(&mut self, a: NaiveDate, b: NaiveDate) -> impl DoubleEndedIterator<Item = &mut Day> {
        let r = DateRange::new(a, b);
        self.days.range_mut(r.start()..=r.end()).map(|(_, d)| d)
    }

    /// Nearest stored day strictly before `date`.
    pub fn before(&self, date: NaiveDate) -> Option<&Day> {
        self.days
            .range((Bound::Unbounded, Bound::Excluded(date)))
            .next_back()
            .map(|(_, d)| d)
    }

    /// Nearest stored day strictly after `date`.
    pub fn after(&self, date: NaiveDate) -> Option<&Day> {
        self.days
            .range((Bound::Excluded(date), Bound::Unbounded))
            .next()
            .map(|(_, d)| d)
    }

    /// Range from the first to the last stored day, `None` when empty.
    pub fn covering_range(&self) -> Option<DateRange> {
        Some(DateRange::new(self.first()?.date(), self.last()?.date()))
    }

    /// True iff every date of `range` has a stored day.
    pub fn is_complete_over(&self, range: &DateRange) -> bool {
        range.iter().all(|date| self.days.contains_key(&date))
    }

    /// True iff the store is non-empty and has no gaps.
    pub fn is_complete(&self) -> bool {
        match self.covering_range() {
            Some(range) => range.size() == self.days.len(),
            None => false,
        }
    }

    /// Recompute phases across the whole store.
    pub fn update_lunar_phases(&mut self) {
        derive::update_lunar_phases(self.days.values_mut());
    }

    /// Recompute day counts to the nearest extremes across the whole store.
    pub fn count_days_to_extremes(&mut self) {
        derive::count_days_to_extremes(self.days.values_mut());
    }
}

impl Extend<Day> for DayStore {
    fn extend<T: IntoIterator<Item = Day>>(&mut self, iter: T) {
        for day in iter {
            self.insert(day);
        }
    }
}

impl FromIterator<Day> for DayStore {
    fn from_iter<T: IntoIterator<Item = Day>>(iter: T) -> Self {
        let mut store = DayStore::new();
        store.extend(iter);
        store
    }
}
