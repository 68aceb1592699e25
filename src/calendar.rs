use std::iter::FusedIterator;

use chrono::{Datelike, NaiveDate};

/// Calendar (month, day) of the two promotion cycles held every year.
pub const CYCLE_DAYS: [(u32, u32); 2] = [(6, 26), (11, 29)];

/// The cycle dates falling in `[start, target]`, both ends inclusive.
///
/// Cheap to copy; every call to [`CycleSchedule::iter`] restarts from the first date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSchedule {
    start: NaiveDate,
    target: NaiveDate,
}

impl CycleSchedule {
    pub fn new(start: NaiveDate, target: NaiveDate) -> Self {
        CycleSchedule { start, target }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn target(&self) -> NaiveDate {
        self.target
    }

    pub fn iter(&self) -> CycleDates {
        CycleDates {
            year: self.start.year(),
            slot: 0,
            start: self.start,
            target: self.target,
        }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a CycleSchedule {
    type Item = NaiveDate;
    type IntoIter = CycleDates;

    fn into_iter(self) -> CycleDates {
        self.iter()
    }
}

/// Lazy walk over the biannual pattern, year by year.
#[derive(Debug, Clone)]
pub struct CycleDates {
    year: i32,
    slot: usize,
    start: NaiveDate,
    target: NaiveDate,
}

impl Iterator for CycleDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while self.start <= self.target && self.year <= self.target.year() {
            let (month, day) = CYCLE_DAYS[self.slot];
            let year = self.year;
            self.slot += 1;
            if self.slot == CYCLE_DAYS.len() {
                self.slot = 0;
                self.year += 1;
            }

            let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                continue;
            };
            if date > self.target {
                // Pattern is ascending, nothing later can qualify.
                self.year = self.target.year() + 1;
                return None;
            }
            if date >= self.start {
                return Some(date);
            }
        }
        None
    }
}

impl FusedIterator for CycleDates {}

/// Whole calendar years elapsed from `from` to `to`, truncated toward zero.
///
/// An anniversary counts on the day itself: 2000-06-26 → 2035-06-26 is 35 years.
pub fn whole_years(from: NaiveDate, to: NaiveDate) -> i32 {
    if to < from {
        return -whole_years(to, from);
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years
}

/// Parse a roster date. Accepts day-first `dd/mm/YYYY` and ISO `YYYY-MM-DD`,
/// ignoring any trailing time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.trim().split(['T', ' ']).next()?;
    if token.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(token, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(token, "%Y-%m-%d"))
        .ok()
}
