// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Normalized recurrence specifications.

use std::fmt::{self, Display};

use jiff::civil::{DateTime, Weekday};

use crate::config::{ByDayConfig, ConfigWeekday, RuleConfig};
use crate::keyword::{
    KW_DAY_FR, KW_DAY_MO, KW_DAY_SA, KW_DAY_SU, KW_DAY_TH, KW_DAY_TU, KW_DAY_WE, KW_RRULE_BYDAY,
    KW_RRULE_BYHOUR, KW_RRULE_BYMINUTE, KW_RRULE_BYMONTH, KW_RRULE_BYMONTHDAY, KW_RRULE_BYSECOND,
    KW_RRULE_BYSETPOS, KW_RRULE_BYWEEKNO, KW_RRULE_BYYEARDAY, KW_RRULE_COUNT, KW_RRULE_FREQ,
    KW_RRULE_INTERVAL, KW_RRULE_UNTIL, KW_RRULE_WKST,
};
use crate::{Frequency, MAX_OCCURRENCES};

/// Errors raised when a rule configuration is rejected at the editing
/// boundary. Inapplicable field combinations are normalized away and never
/// reach this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RuleError {
    /// `count` and `until` were both provided.
    #[error("count and until are mutually exclusive")]
    CountUntilExclusive,

    /// A `by*` value lies outside its valid range.
    #[error("{field} value {value} is out of range")]
    FieldOutOfRange {
        /// The configuration field the value belongs to.
        field: &'static str,
        /// The offending value.
        value: i64,
    },

    /// An unrecognized weekday name.
    #[error("unrecognized weekday name: {0}")]
    UnknownWeekday(String),
}

/// Day-of-week selector, optionally qualified by an occurrence within the
/// enclosing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByWeekday {
    /// Day of the week.
    pub day: Weekday,
    /// Occurrence in the period: 2 for "2nd", -1 for "last". `None` matches
    /// every such weekday.
    pub nth: Option<i8>,
}

impl ByWeekday {
    /// Plain weekday selector without an occurrence qualifier.
    pub fn every(day: Weekday) -> Self {
        ByWeekday { day, nth: None }
    }

    /// The `n`-th such weekday of the period, negative from the end.
    pub fn nth(day: Weekday, n: i8) -> Self {
        ByWeekday { day, nth: Some(n) }
    }

    // Packed ordering key: weekday plus seven times the occurrence, the
    // numeric day-offset encoding of the external vocabulary.
    fn code(self) -> i16 {
        i16::from(self.day.to_sunday_zero_offset()) + 7 * i16::from(self.nth.unwrap_or(0))
    }

    fn rfc_code(self) -> &'static str {
        match self.day {
            Weekday::Sunday => KW_DAY_SU,
            Weekday::Monday => KW_DAY_MO,
            Weekday::Tuesday => KW_DAY_TU,
            Weekday::Wednesday => KW_DAY_WE,
            Weekday::Thursday => KW_DAY_TH,
            Weekday::Friday => KW_DAY_FR,
            Weekday::Saturday => KW_DAY_SA,
        }
    }
}

impl PartialOrd for ByWeekday {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByWeekday {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

/// How a recurrence ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// After a fixed number of occurrences.
    Count(u32),
    /// At an inclusive end date-time.
    Until(DateTime),
    /// Never.
    Unbounded,
}

/// An immutable, normalized recurrence rule.
///
/// Construction applies the full normalization table once: inapplicable
/// fields are dropped, degenerate rules inherit selectors from the anchor
/// date, and anchors whose literal day may not exist in every cycle are
/// marked complex. The stored value never needs re-interpretation at read
/// time; edits produce a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceSpec {
    pub(crate) freq: Frequency,
    pub(crate) interval: i64,
    pub(crate) wkst: Weekday,
    pub(crate) terminator: Terminator,

    // Canonical selectors, the serialization surface.
    pub(crate) by_day: Vec<ByWeekday>,
    pub(crate) by_month_day: Vec<i8>,
    pub(crate) by_month: Vec<i8>,
    pub(crate) by_year_day: Vec<i16>,
    pub(crate) by_week_no: Vec<i8>,
    pub(crate) by_hour: Vec<i8>,
    pub(crate) by_minute: Vec<i8>,
    pub(crate) by_second: Vec<i8>,
    pub(crate) by_set_pos: Vec<i32>,

    // Generation view: canonical selectors with anchor inheritance and
    // complex-anchor derivation applied. Only these three can differ.
    pub(crate) gen_by_day: Vec<ByWeekday>,
    pub(crate) gen_by_month_day: Vec<i8>,
    pub(crate) gen_by_month: Vec<i8>,

    pub(crate) complex: bool,
}

impl RecurrenceSpec {
    /// Builds a normalized specification from a configuration and the
    /// anchor date the rule is attached to (the master event's start).
    pub fn new(config: &RuleConfig, anchor: DateTime) -> Result<Self, RuleError> {
        if config.count.is_some() && config.until.is_some() {
            return Err(RuleError::CountUntilExclusive);
        }

        let freq = config.frequency;

        let interval = if config.interval < 1 {
            tracing::warn!(interval = config.interval, "invalid interval, clamping to 1");
            1
        } else {
            i64::from(config.interval)
        };

        let terminator = match (config.count, config.until) {
            (Some(count), None) => {
                let clamped = count.min(MAX_OCCURRENCES as u32);
                if clamped != count {
                    tracing::warn!(count, clamped, "clamping occurrence count");
                }
                Terminator::Count(clamped)
            }
            (None, Some(until)) => Terminator::Until(until),
            (None, None) => Terminator::Unbounded,
            (Some(_), Some(_)) => unreachable!("checked above"),
        };

        let mut by_day = norm_by_day(&config.by_day)?;
        let mut by_month_day = norm_signed8(&config.by_month_day, "byMonthDay", 31)?;
        let by_month = norm_month(&config.by_month)?;
        let mut by_year_day = norm_signed16(&config.by_year_day, "byYearDay", 366)?;
        let mut by_week_no = norm_signed8(&config.by_week_no, "byWeekNo", 53)?;
        let by_hour = norm_unsigned(&config.by_hour, "byHour", 23)?;
        let by_minute = norm_unsigned(&config.by_minute, "byMinute", 59)?;
        let by_second = norm_unsigned(&config.by_second, "bySecond", 60)?;
        let by_set_pos = norm_set_pos(&config.by_set_position)?;

        // Applicability table: fields that make no sense for the frequency
        // are dropped, never stored contradictorily.
        if freq != Frequency::Yearly {
            by_week_no.clear();
        }
        if freq == Frequency::Weekly {
            by_month_day.clear();
        }
        if matches!(freq, Frequency::Weekly | Frequency::Daily | Frequency::Monthly) {
            by_year_day.clear();
        }

        // Anchor inheritance: degenerate selector combinations take the
        // missing selector from the anchor date.
        let mut gen_by_day = by_day.clone();
        let mut gen_by_month_day = by_month_day.clone();
        let mut gen_by_month = by_month.clone();
        match freq {
            Frequency::Yearly => {
                if !gen_by_month_day.is_empty()
                    && gen_by_month.is_empty()
                    && gen_by_day.is_empty()
                    && by_year_day.is_empty()
                    && by_week_no.is_empty()
                {
                    if gen_by_month_day == [anchor.day()] {
                        gen_by_month_day.clear();
                    } else {
                        gen_by_month = vec![anchor.month()];
                    }
                } else if !gen_by_month.is_empty()
                    && gen_by_month_day.is_empty()
                    && gen_by_day.is_empty()
                    && by_year_day.is_empty()
                {
                    gen_by_month_day = vec![anchor.day()];
                }
            }
            Frequency::Monthly => {
                if !gen_by_month.is_empty() && gen_by_month_day.is_empty() && gen_by_day.is_empty()
                {
                    gen_by_month_day = vec![anchor.day()];
                }
            }
            Frequency::Weekly => {
                if !gen_by_month.is_empty() && gen_by_day.is_empty() {
                    gen_by_day = vec![ByWeekday::every(anchor.weekday())];
                }
            }
            _ => {}
        }

        // Complex anchors: the literal anchor day may not exist in every
        // cycle, so the generator must filter instead of repeating it.
        let date_selectors_empty = gen_by_month.is_empty()
            && gen_by_month_day.is_empty()
            && gen_by_day.is_empty()
            && by_year_day.is_empty()
            && by_week_no.is_empty();
        let complex = match freq {
            Frequency::Monthly => anchor.day() > 28 && date_selectors_empty,
            Frequency::Yearly => anchor.month() == 2 && date_selectors_empty,
            _ => false,
        };
        if complex {
            gen_by_month_day = vec![anchor.day()];
            if freq == Frequency::Yearly {
                gen_by_month = vec![anchor.month()];
            }
        }

        by_day.sort();
        by_day.dedup();
        gen_by_day.sort();
        gen_by_day.dedup();

        Ok(RecurrenceSpec {
            freq,
            interval,
            wkst: config.first_day_of_week.0,
            terminator,
            by_day,
            by_month_day,
            by_month,
            by_year_day,
            by_week_no,
            by_hour,
            by_minute,
            by_second,
            by_set_pos,
            gen_by_day,
            gen_by_month_day,
            gen_by_month,
            complex,
        })
    }

    /// The recurrence frequency.
    pub fn frequency(&self) -> Frequency {
        self.freq
    }

    /// The interval between periods, at least 1.
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// The configured first day of the week.
    pub fn week_start(&self) -> Weekday {
        self.wkst
    }

    /// How the recurrence ends.
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Whether the anchor's literal day may not exist in every cycle, which
    /// forces the generator onto the filtered path.
    pub fn is_complex(&self) -> bool {
        self.complex
    }

    /// Reproduces the external configuration, modulo the documented
    /// default-value omissions and ascending array order.
    pub fn to_config(&self) -> RuleConfig {
        let mut config = RuleConfig::new(self.freq);
        config.interval = self.interval as u32;
        config.first_day_of_week = ConfigWeekday(self.wkst);
        config.by_day = self
            .by_day
            .iter()
            .map(|bwd| ByDayConfig {
                day: ConfigWeekday(bwd.day),
                nth_of_period: bwd.nth,
            })
            .collect();
        config.by_month_day = self.by_month_day.clone();
        config.by_month = self.by_month.clone();
        config.by_year_day = self.by_year_day.clone();
        config.by_week_no = self.by_week_no.clone();
        config.by_hour = self.by_hour.clone();
        config.by_minute = self.by_minute.clone();
        config.by_second = self.by_second.clone();
        config.by_set_position = self.by_set_pos.clone();
        match self.terminator {
            Terminator::Count(count) => config.count = Some(count),
            Terminator::Until(until) => config.until = Some(until),
            Terminator::Unbounded => {}
        }
        config
    }
}

impl Display for RecurrenceSpec {
    /// Formats the rule in the RFC 5545 `RRULE` value form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{KW_RRULE_FREQ}={}", self.freq)?;
        if self.interval != 1 {
            write!(f, ";{KW_RRULE_INTERVAL}={}", self.interval)?;
        }
        match self.terminator {
            Terminator::Count(count) => write!(f, ";{KW_RRULE_COUNT}={count}")?,
            Terminator::Until(until) => {
                write!(f, ";{KW_RRULE_UNTIL}={}", until.strftime("%Y%m%dT%H%M%S"))?;
            }
            Terminator::Unbounded => {}
        }
        write_list(f, KW_RRULE_BYMONTH, &self.by_month)?;
        write_list(f, KW_RRULE_BYWEEKNO, &self.by_week_no)?;
        write_list(f, KW_RRULE_BYYEARDAY, &self.by_year_day)?;
        write_list(f, KW_RRULE_BYMONTHDAY, &self.by_month_day)?;
        if !self.by_day.is_empty() {
            write!(f, ";{KW_RRULE_BYDAY}=")?;
            for (i, bwd) in self.by_day.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                if let Some(n) = bwd.nth {
                    write!(f, "{n}")?;
                }
                write!(f, "{}", bwd.rfc_code())?;
            }
        }
        write_list(f, KW_RRULE_BYHOUR, &self.by_hour)?;
        write_list(f, KW_RRULE_BYMINUTE, &self.by_minute)?;
        write_list(f, KW_RRULE_BYSECOND, &self.by_second)?;
        write_list(f, KW_RRULE_BYSETPOS, &self.by_set_pos)?;
        if self.wkst != Weekday::Monday {
            write!(f, ";{KW_RRULE_WKST}={}", ByWeekday::every(self.wkst).rfc_code())?;
        }
        Ok(())
    }
}

fn write_list<T: Display>(f: &mut fmt::Formatter<'_>, keyword: &str, values: &[T]) -> fmt::Result {
    if values.is_empty() {
        return Ok(());
    }
    write!(f, ";{keyword}=")?;
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

fn norm_unsigned(values: &[i8], field: &'static str, max: i8) -> Result<Vec<i8>, RuleError> {
    let mut out = values.to_vec();
    for &value in &out {
        if !(0..=max).contains(&value) {
            return Err(RuleError::FieldOutOfRange {
                field,
                value: i64::from(value),
            });
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn norm_signed8(values: &[i8], field: &'static str, max: i8) -> Result<Vec<i8>, RuleError> {
    let mut out = values.to_vec();
    for &value in &out {
        if value == 0 || i64::from(value).abs() > i64::from(max) {
            return Err(RuleError::FieldOutOfRange {
                field,
                value: i64::from(value),
            });
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn norm_signed16(values: &[i16], field: &'static str, max: i16) -> Result<Vec<i16>, RuleError> {
    let mut out = values.to_vec();
    for &value in &out {
        if value == 0 || i64::from(value).abs() > i64::from(max) {
            return Err(RuleError::FieldOutOfRange {
                field,
                value: i64::from(value),
            });
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn norm_month(values: &[i8]) -> Result<Vec<i8>, RuleError> {
    let mut out = values.to_vec();
    for &value in &out {
        if !(1..=12).contains(&value) {
            return Err(RuleError::FieldOutOfRange {
                field: "byMonth",
                value: i64::from(value),
            });
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// A position of 0 has always meant "unset" in stored rule data; it is
/// dropped rather than rejected.
fn norm_set_pos(values: &[i32]) -> Result<Vec<i32>, RuleError> {
    let mut out = Vec::with_capacity(values.len());
    for &value in values {
        if value == 0 {
            continue;
        }
        if i64::from(value).abs() > 366 {
            return Err(RuleError::FieldOutOfRange {
                field: "bySetPosition",
                value: i64::from(value),
            });
        }
        out.push(value);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn norm_by_day(values: &[ByDayConfig]) -> Result<Vec<ByWeekday>, RuleError> {
    let mut out = Vec::with_capacity(values.len());
    for entry in values {
        let nth = match entry.nth_of_period {
            // 0 is "unqualified", matching the set-position convention.
            Some(0) | None => None,
            Some(n) if i64::from(n).abs() <= 53 => Some(n),
            Some(n) => {
                return Err(RuleError::FieldOutOfRange {
                    field: "byDay",
                    value: i64::from(n),
                });
            }
        };
        out.push(ByWeekday {
            day: entry.day.0,
            nth,
        });
    }
    out.dedup();
    Ok(out)
}
