//! period.rs
//!
//! Splits the analysis window into calendar years.
//!
//! GitHub's `contributionsCollection` only accepts ranges of at most one year,
//! so contribution totals are requested per year and summed afterwards:
//!   • past years span Jan 1 00:00:00 through Dec 31 23:59:59 UTC
//!   • the current year stops at `now` (no future data is requested)

use chrono::{DateTime, Datelike, NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Returns one range per calendar year from `start_year` through `now.year()`.
pub fn yearly_ranges(start_year: i32, now: DateTime<Utc>) -> Vec<DateRange> {
    (start_year..=now.year())
        .filter_map(|year| {
            let from = utc(year, 1, 1, 0, 0, 0)?;
            let to = if year == now.year() {
                now
            } else {
                utc(year, 12, 31, 23, 59, 59)?
            };
            Some(DateRange { from, to })
        })
        .collect()
}

fn utc(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn one_range_per_year_with_current_year_clamped() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap();
        let ranges = yearly_ranges(2022, now);

        assert_eq!(ranges.len(), 3);
        assert_eq!(
            ranges[0],
            DateRange {
                from: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
                to: Utc.with_ymd_and_hms(2022, 12, 31, 23, 59, 59).unwrap(),
            }
        );
        assert_eq!(ranges[2].from, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(ranges[2].to, now);
    }

    #[test]
    fn start_year_equal_to_current_year() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let ranges = yearly_ranges(2025, now);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].to, now);
    }

    #[test]
    fn start_year_in_the_future_yields_nothing() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(yearly_ranges(2026, now).is_empty());
    }
}
