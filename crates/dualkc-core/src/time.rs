//! Simulation window and day-of-year helpers
//!
//! A run is configured with an optional `[start, end]` window; the ingester
//! intersects it with the coverage of the forcing files and hands the rest of
//! the engine a concrete [`ResolvedWindow`]. Day-of-year values are 1-based
//! (1..=366).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{DualKcError, DualKcResult};

/// Requested simulation window; either bound may be left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    /// Intersect the requested window with the `[coverage_start,
    /// coverage_end]` span of a forcing file.
    ///
    /// Returns `DateRangeEmpty` when the intersection holds no days.
    pub fn resolve(
        &self,
        coverage_start: NaiveDate,
        coverage_end: NaiveDate,
        table: &str,
    ) -> DualKcResult<ResolvedWindow> {
        let start = match self.start {
            Some(requested) => requested.max(coverage_start),
            None => coverage_start,
        };
        let end = match self.end {
            Some(requested) => requested.min(coverage_end),
            None => coverage_end,
        };
        if start > end {
            return Err(DualKcError::DateRangeEmpty {
                table: table.to_string(),
                start,
                end,
            });
        }
        Ok(ResolvedWindow { start, end })
    }
}

/// Concrete inclusive day range produced by the ingester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ResolvedWindow {
    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Ascending iterator over every day in the window.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Calendar years touched by the window, ascending.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start.year()..=self.end.year()
    }
}

/// 1-based day of year.
pub fn doy(date: NaiveDate) -> u16 {
    date.ordinal() as u16
}

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn resolve_clamps_to_coverage() {
        let window = DateWindow {
            start: Some(d(1999, 1, 1)),
            end: Some(d(2001, 12, 31)),
        };
        let resolved = window.resolve(d(2000, 1, 1), d(2003, 6, 30), "weather").unwrap();
        assert_eq!(resolved.start, d(2000, 1, 1));
        assert_eq!(resolved.end, d(2001, 12, 31));
    }

    #[test]
    fn open_bounds_take_coverage() {
        let resolved = DateWindow::default()
            .resolve(d(2000, 1, 1), d(2000, 12, 31), "weather")
            .unwrap();
        assert_eq!(resolved.num_days(), 366);
    }

    #[test]
    fn empty_intersection_is_an_error() {
        let window = DateWindow {
            start: Some(d(2010, 1, 1)),
            end: None,
        };
        let err = window.resolve(d(2000, 1, 1), d(2005, 12, 31), "refet").unwrap_err();
        assert!(matches!(err, DualKcError::DateRangeEmpty { .. }));
    }

    #[test]
    fn days_iterates_inclusive() {
        let window = ResolvedWindow {
            start: d(2001, 2, 26),
            end: d(2001, 3, 2),
        };
        let days: Vec<_> = window.days().collect();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], d(2001, 2, 26));
        assert_eq!(days[4], d(2001, 3, 2));
    }

    #[test]
    fn doy_is_one_based() {
        assert_eq!(doy(d(2001, 1, 1)), 1);
        assert_eq!(doy(d(2000, 12, 31)), 366);
        assert_eq!(doy(d(2001, 12, 31)), 365);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2001, 2), 28);
        assert_eq!(days_in_month(2001, 9), 30);
    }
}
