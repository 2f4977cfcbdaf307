// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Occurrence generation: one period of candidates at a time, driven
//! repeatedly by range queries.

use jiff::Span;
use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;

use crate::spec::Terminator;
use crate::weekdate::{start_of_week, week_of_year, weeks_in_year};
use crate::{Frequency, MAX_OCCURRENCES, RecurrenceSpec};

/// One period of candidate datetimes plus the anchor of the next period.
#[derive(Debug, Clone)]
pub struct Period {
    /// Ascending candidate datetimes, or `None` when the empty-period
    /// budget was exhausted without producing a single candidate.
    pub candidates: Option<Vec<DateTime>>,

    /// The anchor the next period starts from, advanced by the interval
    /// whether or not candidates were produced.
    pub next_anchor: DateTime,
}

impl RecurrenceSpec {
    /// Produces one period's worth of candidates at or around `anchor`.
    ///
    /// Scans forward over empty periods, up to the per-frequency budget,
    /// so rules that match nothing terminate with `None` candidates
    /// instead of looping forever.
    pub fn iterate(&self, anchor: DateTime) -> Period {
        let mut anchor = anchor;
        for _ in 0..self.freq.empty_period_budget() {
            let candidates = self.period_candidates(anchor);
            let next = self.advance(anchor);
            if !candidates.is_empty() {
                return Period {
                    candidates: Some(candidates),
                    next_anchor: next,
                };
            }
            if next <= anchor {
                // Civil range exhausted.
                break;
            }
            anchor = next;
        }
        tracing::debug!(frequency = %self.freq, "empty-period budget exhausted");
        Period {
            candidates: None,
            next_anchor: anchor,
        }
    }

    /// All occurrences of the rule anchored at `start`, optionally clipped
    /// to `[begin, end)`.
    ///
    /// `start` itself is always the first occurrence, whether or not it
    /// matches the rule, and counts against a `Count` terminator. At most
    /// 16384 datetimes are returned.
    pub fn occurrences_between(
        &self,
        start: DateTime,
        begin: Option<DateTime>,
        end: Option<DateTime>,
    ) -> Vec<DateTime> {
        let mut remaining = match self.terminator {
            Terminator::Count(count) => count as usize,
            _ => usize::MAX,
        };

        // `until` is stored inclusive; the effective end is one second past.
        let mut cutoff = end;
        if let Terminator::Until(until) = self.terminator {
            let exclusive = until
                .checked_add(Span::new().seconds(1))
                .unwrap_or(DateTime::MAX);
            cutoff = Some(match cutoff {
                Some(end) => end.min(exclusive),
                None => exclusive,
            });
        }

        let mut out = Vec::new();
        if remaining == 0 {
            return out;
        }
        if let Some(cut) = cutoff {
            if start >= cut {
                return out;
            }
        }

        if begin.is_none_or(|b| start >= b) {
            out.push(start);
        }
        remaining -= 1;
        if remaining == 0 {
            return out;
        }

        // With a count terminator every occurrence from the start onwards
        // must be accounted for, so the anchor cannot be skipped ahead.
        let mut anchor = match begin {
            Some(b) if b > start && !matches!(self.terminator, Terminator::Count(_)) => {
                self.skip_to_anchor(start, b)
            }
            _ => start,
        };

        'periods: loop {
            let period = self.iterate(anchor);
            let Some(candidates) = period.candidates else {
                break;
            };
            for candidate in candidates {
                if candidate <= start {
                    continue;
                }
                if let Some(cut) = cutoff {
                    if candidate >= cut {
                        break 'periods;
                    }
                }
                // Occurrences before the queried range still consume count.
                if begin.is_none_or(|b| candidate >= b) {
                    out.push(candidate);
                    if out.len() >= MAX_OCCURRENCES {
                        break 'periods;
                    }
                }
                remaining -= 1;
                if remaining == 0 {
                    break 'periods;
                }
            }
            if period.next_anchor <= anchor {
                break;
            }
            anchor = period.next_anchor;
        }
        out
    }

    /// Whether `candidate` is an occurrence of the rule anchored at
    /// `start`.
    pub fn generates(&self, start: DateTime, candidate: DateTime) -> bool {
        if candidate < start {
            return false;
        }
        let next = candidate
            .checked_add(Span::new().seconds(1))
            .unwrap_or(DateTime::MAX);
        self.occurrences_between(start, Some(candidate), Some(next))
            .first()
            == Some(&candidate)
    }

    /// The last interval-aligned anchor at or before `begin`, computed in
    /// closed form so sparse range queries skip empty stretches without
    /// walking period by period.
    fn skip_to_anchor(&self, start: DateTime, begin: DateTime) -> DateTime {
        let iv = self.interval;
        let anchor = match self.freq {
            Frequency::Yearly => {
                let years = i64::from(begin.year()) - i64::from(start.year());
                let k = years - years.rem_euclid(iv);
                let base = if self.yearly_expands() {
                    start.first_of_year()
                } else {
                    start
                };
                base.checked_add(Span::new().years(k))
            }
            Frequency::Monthly => {
                let months = month_index(begin) - month_index(start);
                let k = months - months.rem_euclid(iv);
                let base = if self.monthly_expands() {
                    start.first_of_month()
                } else {
                    start
                };
                base.checked_add(Span::new().months(k))
            }
            Frequency::Weekly => {
                let from = start_of_week(self.wkst, start.date());
                let to = start_of_week(self.wkst, begin.date());
                let weeks = (day_number(to) - day_number(from)) / 7;
                let k = weeks - weeks.rem_euclid(iv);
                start.checked_add(Span::new().weeks(k))
            }
            Frequency::Daily => {
                let days = day_number(begin.date()) - day_number(start.date());
                let k = days - days.rem_euclid(iv);
                start.checked_add(Span::new().days(k))
            }
            Frequency::Hourly => {
                let hours = (utc_seconds(begin) - utc_seconds(start)) / 3_600;
                let k = hours - hours.rem_euclid(iv);
                start.checked_add(Span::new().hours(k))
            }
            Frequency::Minutely => {
                let minutes = (utc_seconds(begin) - utc_seconds(start)) / 60;
                let k = minutes - minutes.rem_euclid(iv);
                start.checked_add(Span::new().minutes(k))
            }
            Frequency::Secondly => {
                let seconds = utc_seconds(begin) - utc_seconds(start);
                let k = seconds - seconds.rem_euclid(iv);
                start.checked_add(Span::new().seconds(k))
            }
        };
        anchor.unwrap_or(start).max(start)
    }

    /// Every candidate in the anchor's period, filtered and expanded.
    fn period_candidates(&self, anchor: DateTime) -> Vec<DateTime> {
        if self.unfiltered() {
            return vec![anchor];
        }

        let time = anchor.time();
        let mut days: Vec<Date> = match self.freq {
            Frequency::Yearly if self.yearly_expands() => {
                days_of(anchor.date().first_of_year(), anchor.date().last_of_year())
            }
            Frequency::Monthly if self.monthly_expands() => {
                days_of(anchor.date().first_of_month(), anchor.date().last_of_month())
            }
            Frequency::Weekly if !self.gen_by_day.is_empty() => {
                let start = start_of_week(self.wkst, anchor.date());
                days_of(
                    start,
                    start.checked_add(Span::new().days(6)).unwrap_or(Date::MAX),
                )
            }
            _ => vec![anchor.date()],
        };
        days.retain(|&day| self.keep_date(day));

        if self.freq >= Frequency::Hourly && !self.keep_time(anchor) {
            return Vec::new();
        }

        let mut set: Vec<DateTime> = days
            .into_iter()
            .map(|day| DateTime::from_parts(day, time))
            .collect();
        set = self.expand_times(set);
        set.sort_unstable();
        set.dedup();
        self.select_positions(set)
    }

    /// Advances by one interval of the frequency. Periods that expand by
    /// date selectors are pinned to the first day of the period so that
    /// interval arithmetic never lands on a constrained day.
    fn advance(&self, anchor: DateTime) -> DateTime {
        let iv = self.interval;
        let next = match self.freq {
            Frequency::Yearly => {
                let base = if self.yearly_expands() {
                    anchor.first_of_year()
                } else {
                    anchor
                };
                base.checked_add(Span::new().years(iv))
            }
            Frequency::Monthly => {
                let base = if self.monthly_expands() {
                    anchor.first_of_month()
                } else {
                    anchor
                };
                base.checked_add(Span::new().months(iv))
            }
            Frequency::Weekly => anchor.checked_add(Span::new().weeks(iv)),
            Frequency::Daily => anchor.checked_add(Span::new().days(iv)),
            Frequency::Hourly => anchor.checked_add(Span::new().hours(iv)),
            Frequency::Minutely => anchor.checked_add(Span::new().minutes(iv)),
            Frequency::Secondly => anchor.checked_add(Span::new().seconds(iv)),
        };
        next.unwrap_or(DateTime::MAX)
    }

    fn unfiltered(&self) -> bool {
        self.gen_by_month.is_empty()
            && self.by_week_no.is_empty()
            && self.by_year_day.is_empty()
            && self.gen_by_month_day.is_empty()
            && self.gen_by_day.is_empty()
            && self.by_hour.is_empty()
            && self.by_minute.is_empty()
            && self.by_second.is_empty()
            && self.by_set_pos.is_empty()
    }

    fn yearly_expands(&self) -> bool {
        !self.gen_by_month.is_empty()
            || !self.by_week_no.is_empty()
            || !self.by_year_day.is_empty()
            || !self.gen_by_month_day.is_empty()
            || !self.gen_by_day.is_empty()
    }

    fn monthly_expands(&self) -> bool {
        !self.gen_by_month_day.is_empty() || !self.gen_by_day.is_empty()
    }

    /// Applies every active date selector to one candidate day. A selector
    /// matches when any allowed value equals the candidate's absolute
    /// position or its negative position from the end of the period.
    fn keep_date(&self, day: Date) -> bool {
        if !self.gen_by_month.is_empty()
            && self.gen_by_month.binary_search(&day.month()).is_err()
        {
            return false;
        }
        if !self.by_week_no.is_empty() {
            let (week_year, week) = week_of_year(self.wkst, day);
            let from_end = week - weeks_in_year(self.wkst, week_year) - 1;
            if self.by_week_no.binary_search(&week).is_err()
                && self.by_week_no.binary_search(&from_end).is_err()
            {
                return false;
            }
        }
        if !self.by_year_day.is_empty() {
            let pos = day.day_of_year();
            let from_end = pos - 1 - day.days_in_year();
            if self.by_year_day.binary_search(&pos).is_err()
                && self.by_year_day.binary_search(&from_end).is_err()
            {
                return false;
            }
        }
        if !self.gen_by_month_day.is_empty() {
            let pos = day.day();
            let from_end = pos - 1 - day.days_in_month();
            if self.gen_by_month_day.binary_search(&pos).is_err()
                && self.gen_by_month_day.binary_search(&from_end).is_err()
            {
                return false;
            }
        }
        if !self.gen_by_day.is_empty() && !self.keep_weekday(day) {
            return false;
        }
        true
    }

    fn keep_weekday(&self, day: Date) -> bool {
        // Occurrence qualifiers count within the month for monthly rules
        // and for yearly rules narrowed to months; otherwise within the
        // year. Weekly and finer rules match on the weekday alone.
        let month_scope = match self.freq {
            Frequency::Monthly => true,
            Frequency::Yearly if self.by_week_no.is_empty() => !self.gen_by_month.is_empty(),
            _ => {
                return self.gen_by_day.iter().any(|bwd| bwd.day == day.weekday());
            }
        };
        for bwd in &self.gen_by_day {
            if bwd.day != day.weekday() {
                continue;
            }
            let Some(nth) = bwd.nth else {
                return true;
            };
            let (pos, from_end) = if month_scope {
                (
                    i16::from((day.day() - 1) / 7 + 1),
                    i16::from(-((day.days_in_month() - day.day()) / 7 + 1)),
                )
            } else {
                (
                    (day.day_of_year() - 1) / 7 + 1,
                    -((day.days_in_year() - day.day_of_year()) / 7 + 1),
                )
            };
            if i16::from(nth) == pos || i16::from(nth) == from_end {
                return true;
            }
        }
        false
    }

    /// Time selectors at or above the frequency's own unit act as limits
    /// on the anchor instead of expanding the set.
    fn keep_time(&self, anchor: DateTime) -> bool {
        if !self.by_hour.is_empty() && self.by_hour.binary_search(&anchor.hour()).is_err() {
            return false;
        }
        if self.freq >= Frequency::Minutely
            && !self.by_minute.is_empty()
            && self.by_minute.binary_search(&anchor.minute()).is_err()
        {
            return false;
        }
        if self.freq >= Frequency::Secondly
            && !self.by_second.is_empty()
            && self.by_second.binary_search(&anchor.second()).is_err()
        {
            return false;
        }
        true
    }

    /// Cross product with the configured hours, minutes, and seconds where
    /// they are finer than the frequency.
    fn expand_times(&self, set: Vec<DateTime>) -> Vec<DateTime> {
        let mut set = set;
        if self.freq < Frequency::Hourly && !self.by_hour.is_empty() {
            set = set
                .iter()
                .flat_map(|dt| {
                    self.by_hour
                        .iter()
                        .filter_map(move |&hour| dt.with().hour(hour).build().ok())
                })
                .collect();
        }
        if self.freq < Frequency::Minutely && !self.by_minute.is_empty() {
            set = set
                .iter()
                .flat_map(|dt| {
                    self.by_minute
                        .iter()
                        .filter_map(move |&minute| dt.with().minute(minute).build().ok())
                })
                .collect();
        }
        if self.freq < Frequency::Secondly && !self.by_second.is_empty() {
            set = set
                .iter()
                .flat_map(|dt| {
                    self.by_second
                        .iter()
                        .filter_map(move |&second| dt.with().second(second).build().ok())
                })
                .collect();
        }
        set
    }

    /// Final ordinal selection over the period's expanded set.
    fn select_positions(&self, set: Vec<DateTime>) -> Vec<DateTime> {
        if self.by_set_pos.is_empty() {
            return set;
        }
        let len = set.len() as i32;
        set.into_iter()
            .enumerate()
            .filter(|(index, _)| {
                let pos = *index as i32 + 1;
                let from_end = pos - 1 - len;
                self.by_set_pos.binary_search(&pos).is_ok()
                    || self.by_set_pos.binary_search(&from_end).is_ok()
            })
            .map(|(_, dt)| dt)
            .collect()
    }
}

fn days_of(first: Date, last: Date) -> Vec<Date> {
    let mut days = Vec::with_capacity(31);
    let mut day = first;
    while day <= last {
        days.push(day);
        let Ok(next) = day.tomorrow() else { break };
        day = next;
    }
    days
}

fn month_index(dt: DateTime) -> i64 {
    i64::from(dt.year()) * 12 + i64::from(dt.month()) - 1
}

/// Days since the epoch, treating the civil date as UTC.
fn day_number(date: Date) -> i64 {
    utc_seconds(date.at(0, 0, 0, 0)).div_euclid(86_400)
}

/// Seconds since the epoch, treating the civil datetime as UTC.
fn utc_seconds(dt: DateTime) -> i64 {
    dt.to_zoned(TimeZone::UTC)
        .map(|zoned| zoned.timestamp().as_second())
        .unwrap_or_default()
}
