use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// `days` on either side of `date`, clamped to the calendar's limits.
    pub fn around(date: NaiveDate, days: u64) -> Self {
        let span = Days::new(days);
        DateRange {
            start: date.checked_sub_days(span).unwrap_or(NaiveDate::MIN),
            end: date.checked_add_days(span).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// The first day of the month after `year`/`month`.
///
/// Bills headed "oktobar 2025" cover consumption up to 1 November 2025.
pub fn first_of_next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)
}

/// `YYYYMMDD`, the compact form used inside payment identities.
pub fn compact(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_range_contains() {
        let range = DateRange::new(d(2025, 1, 1), d(2025, 12, 31));
        assert!(range.contains(d(2025, 6, 15)));
        assert!(range.contains(d(2025, 1, 1))); // inclusive start
        assert!(range.contains(d(2025, 12, 31))); // inclusive end
        assert!(!range.contains(d(2024, 12, 31)));
        assert!(!range.contains(d(2026, 1, 1)));
    }

    #[test]
    fn date_range_around() {
        let range = DateRange::around(d(2025, 11, 1), 10);
        assert_eq!(range.start, d(2025, 10, 22));
        assert_eq!(range.end, d(2025, 11, 11));
        assert_eq!(range.to_string(), "2025-10-22 to 2025-11-11");
    }

    #[test]
    fn next_month_rolls_over_year() {
        assert_eq!(first_of_next_month(2025, 10), Some(d(2025, 11, 1)));
        assert_eq!(first_of_next_month(2025, 12), Some(d(2026, 1, 1)));
        assert_eq!(first_of_next_month(2025, 13), None);
    }

    #[test]
    fn compact_is_zero_padded() {
        assert_eq!(compact(d(2025, 3, 5)), "20250305");
    }
}
