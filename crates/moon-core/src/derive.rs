//! Derivation of neighbor-dependent day facts.
//!
//! Both passes take any ascending sequence of days (the whole store, an
//! extension cache, a slice) so generation and import share one code path.

use chrono::NaiveDate;

use crate::date_range::shift;
use crate::day::Day;
use crate::lunar::LunarPhase;

fn is_next_day(earlier: NaiveDate, later: NaiveDate) -> bool {
    shift(earlier, 1) == later
}

/// Slide a 3-day window over ascending `days` and set the phase of every
/// interior day whose calendar neighbors are both present. The first and last
/// day are never touched.
pub fn update_lunar_phases<'a, I>(days: I)
where
    I: IntoIterator<Item = &'a mut Day>,
{
    let mut days: Vec<&mut Day> = days.into_iter().collect();

    if days.len() < 3 {
        tracing::trace!(len = days.len(), "too few days for phase derivation");
        return;
    }

    let window: Vec<(NaiveDate, f64)> = days
        .iter()
        .map(|d| (d.date(), d.raw.lunar_visibility))
        .collect();

    for i in 1..days.len() - 1 {
        let (prev_date, prev_vis) = window[i - 1];
        let (date, vis) = window[i];
        let (next_date, next_vis) = window[i + 1];

        if !is_next_day(prev_date, date) || !is_next_day(date, next_date) {
            continue;
        }

        let phase = LunarPhase::classify(prev_vis, vis, next_vis);
        tracing::trace!(%date, %phase, "phase derived");
        days[i].derived.phase = Some(phase);
    }
}

/// One step of an extreme counter walking in either direction.
///
/// `previous` is the date visited just before `day`; a calendar gap or an
/// unknown phase resets the counter to unknown.
fn step_counter(counter: Option<u32>, previous: Option<NaiveDate>, day: &Day) -> Option<u32> {
    let adjacent = previous.is_some_and(|p| (day.date() - p).num_days().abs() == 1);

    match day.phase() {
        None => None,
        Some(phase) if phase.is_lunar_extreme() => Some(0),
        Some(_) if adjacent => counter.map(|c| c + 1),
        Some(_) => None,
    }
}

/// Set `days_since_extreme` with a forward pass and `days_until_extreme` with
/// a backward pass over ascending `days`.
pub fn count_days_to_extremes<'a, I>(days: I)
where
    I: IntoIterator<Item = &'a mut Day>,
{
    let mut days: Vec<&mut Day> = days.into_iter().collect();

    let mut counter = None;
    let mut previous = None;
    for day in days.iter_mut() {
        counter = step_counter(counter, previous, day);
        day.derived.days_since_extreme = counter;
        previous = Some(day.date());
    }

    counter = None;
    previous = None;
    for day in days.iter_mut().rev() {
        counter = step_counter(counter, previous, day);
        day.derived.days_until_extreme = counter;
        previous = Some(day.date());
    }

    tracing::debug!(len = days.len(), "counted days to lunar extremes");
}

/// True if any day in the sequence carries a full or new moon.
pub fn contains_lunar_extreme<'a, I>(days: I) -> bool
where
    I: IntoIterator<Item = &'a Day>,
{
    days.into_iter().any(Day::is_lunar_extreme)
}
