// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Week arithmetic relative to a configurable first day of the week.
//!
//! Week numbering follows the RFC 5545 generalization of ISO 8601: week 1
//! of a year is the first week, starting on the configured weekday, that
//! contains at least four days of that year.

use jiff::Span;
use jiff::civil::{Date, Weekday};

/// Days from the start of `day`'s week to `day`, in `0..=6`.
pub(crate) fn days_since_week_start(wkst: Weekday, day: Weekday) -> i8 {
    (day.to_monday_zero_offset() - wkst.to_monday_zero_offset()).rem_euclid(7)
}

/// The first day of the week containing `date`.
pub(crate) fn start_of_week(wkst: Weekday, date: Date) -> Date {
    let back = i64::from(days_since_week_start(wkst, date.weekday()));
    date.checked_sub(Span::new().days(back)).unwrap_or(Date::MIN)
}

fn jan1(year: i16) -> Date {
    Date::new(year, 1, 1).unwrap_or(if year > 0 { Date::MAX } else { Date::MIN })
}

/// The first day of week 1 of `year`.
fn week1_start(wkst: Weekday, year: i16) -> Date {
    let first = jan1(year);
    let sow = start_of_week(wkst, first);
    if days_since_week_start(wkst, first.weekday()) <= 3 {
        sow
    } else {
        sow.checked_add(Span::new().days(7)).unwrap_or(Date::MAX)
    }
}

/// Whole days from `from` to `to`, negative when `to` precedes `from`.
fn days_between(from: Date, to: Date) -> i64 {
    to.since(from).map(|span| i64::from(span.get_days())).unwrap_or(0)
}

/// Number of weeks in `year`.
pub(crate) fn weeks_in_year(wkst: Weekday, year: i16) -> i8 {
    let days = days_between(week1_start(wkst, year), week1_start(wkst, year.saturating_add(1)));
    (days / 7) as i8
}

/// The `(year, week)` pair for `date`.
///
/// Dates in the few January days before week 1 belong to the final week of
/// the previous year; dates at the end of December may already belong to
/// week 1 of the next year.
pub(crate) fn week_of_year(wkst: Weekday, date: Date) -> (i16, i8) {
    let year = date.year();
    let w1 = week1_start(wkst, year);
    if date < w1 {
        return (year - 1, weeks_in_year(wkst, year - 1));
    }
    if date >= week1_start(wkst, year.saturating_add(1)) {
        return (year + 1, 1);
    }
    (year, (days_between(w1, date) / 7 + 1) as i8)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn computes_days_since_week_start() {
        assert_eq!(days_since_week_start(Weekday::Monday, Weekday::Monday), 0);
        assert_eq!(days_since_week_start(Weekday::Monday, Weekday::Sunday), 6);
        assert_eq!(days_since_week_start(Weekday::Sunday, Weekday::Sunday), 0);
        assert_eq!(days_since_week_start(Weekday::Sunday, Weekday::Saturday), 6);
    }

    #[test]
    fn finds_start_of_week() {
        // 1997-08-05 is a Tuesday.
        let tue = date(1997, 8, 5);
        assert_eq!(start_of_week(Weekday::Monday, tue), date(1997, 8, 4));
        assert_eq!(start_of_week(Weekday::Sunday, tue), date(1997, 8, 3));
    }

    #[test]
    fn matches_iso_week_numbers_for_monday_start() {
        // Known ISO 8601 values.
        assert_eq!(week_of_year(Weekday::Monday, date(2015, 12, 28)), (2015, 53));
        assert_eq!(week_of_year(Weekday::Monday, date(2016, 1, 1)), (2015, 53));
        assert_eq!(week_of_year(Weekday::Monday, date(2016, 1, 4)), (2016, 1));
        assert_eq!(week_of_year(Weekday::Monday, date(2014, 12, 29)), (2015, 1));
    }

    #[test]
    fn counts_weeks_in_year() {
        assert_eq!(weeks_in_year(Weekday::Monday, 2015), 53);
        assert_eq!(weeks_in_year(Weekday::Monday, 2016), 52);
    }

    #[test]
    fn first_week_requires_four_days() {
        // 1998-01-01 is a Thursday, so week 1 of 1998 (Monday start) begins
        // on 1997-12-29.
        assert_eq!(week_of_year(Weekday::Monday, date(1997, 12, 29)), (1998, 1));
        assert_eq!(week_of_year(Weekday::Monday, date(1998, 1, 1)), (1998, 1));
    }
}
