use std::fmt;
use std::iter::FusedIterator;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// Shift a date by a signed number of days, clamping at chrono's date limits.
pub fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(TimeDelta::days(days))
        .unwrap_or(if days < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        })
}

/// Inclusive range of calendar dates. `start <= end` always holds; the
/// constructor swaps reversed operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a > b {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Range covering a single date.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// True if `other` is a subset of (or equal to) this range.
    pub fn contains_range(&self, other: &DateRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of dates in the range, both ends included.
    pub fn size(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Widen the range by `days` on both sides.
    pub fn padded(&self, days: i64) -> Self {
        Self::new(shift(self.start, -days), shift(self.end, days))
    }

    pub fn iter(&self) -> DateIter {
        DateIter {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

impl IntoIterator for DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> DateIter {
        self.iter()
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> DateIter {
        self.iter()
    }
}

/// Ascending iterator over the dates of a [`DateRange`].
#[derive(Clone, Debug)]
pub struct DateIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = if current == self.end {
            None
        } else {
            current.succ_opt()
        };
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(next) if next <= self.end => {
                let n = (self.end - next).num_days() as usize + 1;
                (n, Some(n))
            }
            _ => (0, Some(0)),
        }
    }
}

impl ExactSizeIterator for DateIter {}

impl FusedIterator for DateIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reversed_operands_are_swapped() {
        let range = DateRange::new(date(2016, 9, 10), date(2016, 9, 1));
        assert_eq!(range.start(), date(2016, 9, 1));
        assert_eq!(range.end(), date(2016, 9, 10));
    }

    #[test]
    fn test_iteration_is_inclusive_and_restartable() {
        let range = DateRange::new(date(2016, 2, 27), date(2016, 3, 1));
        let first: Vec<NaiveDate> = range.iter().collect();
        let second: Vec<NaiveDate> = range.into_iter().collect();
        assert_eq!(
            first,
            vec![
                date(2016, 2, 27),
                date(2016, 2, 28),
                date(2016, 2, 29),
                date(2016, 3, 1)
            ]
        );
        assert_eq!(first, second);
        assert_eq!(range.size(), 4);
        assert_eq!(range.iter().len(), 4);
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::single(date(2016, 9, 3));
        assert_eq!(range.size(), 1);
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![date(2016, 9, 3)]);
    }

    #[test]
    fn test_contains_date() {
        let range = DateRange::new(date(2016, 9, 1), date(2016, 9, 5));
        assert!(range.contains(date(2016, 9, 1)));
        assert!(range.contains(date(2016, 9, 3)));
        assert!(range.contains(date(2016, 9, 5)));
        assert!(!range.contains(date(2016, 8, 31)));
        assert!(!range.contains(date(2016, 9, 6)));
    }

    #[test]
    fn test_contains_range() {
        let outer = DateRange::new(date(2016, 9, 1), date(2016, 9, 30));
        let inner = DateRange::new(date(2016, 9, 5), date(2016, 9, 6));
        let overlapping = DateRange::new(date(2016, 8, 25), date(2016, 9, 6));

        assert!(outer.contains_range(&inner));
        assert!(outer.contains_range(&outer));
        assert!(!inner.contains_range(&outer));
        assert!(!outer.contains_range(&overlapping));
    }

    #[test]
    fn test_padded() {
        let range = DateRange::new(date(2016, 9, 3), date(2016, 9, 5)).padded(1);
        assert_eq!(range, DateRange::new(date(2016, 9, 2), date(2016, 9, 6)));
    }

    #[test]
    fn test_iterator_at_date_limit_terminates() {
        let range = DateRange::new(shift(NaiveDate::MAX, -1), NaiveDate::MAX);
        assert_eq!(range.iter().count(), 2);
    }

    proptest! {
        #[test]
        fn prop_size_is_order_independent(a in -20_000i64..20_000, b in -20_000i64..20_000) {
            let base = date(2000, 1, 1);
            let x = shift(base, a);
            let y = shift(base, b);
            let forward = DateRange::new(x, y);
            let backward = DateRange::new(y, x);

            prop_assert_eq!(forward.size(), backward.size());
            prop_assert_eq!(forward.start(), backward.start());
            prop_assert_eq!(forward.end(), backward.end());
            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward.size() as i64, (a - b).abs() + 1);
        }
    }
}
