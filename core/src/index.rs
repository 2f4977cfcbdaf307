// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Day-bucketed cache over a sliding window, answering "which occurrences
//! touch this UTC day" without unbounded recurrence expansion.

use std::collections::BTreeMap;

use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};

use crate::event::{EventId, MasterEvent};
use crate::occurrence::{OccurrenceId, effective_interval, occurrence_refs_in_range};

// How far a freshly covered day extends the window on each side. Month-ish
// padding keeps a scrolling calendar view from rebuilding on every step.
const PAD_BEFORE: SignedDuration = SignedDuration::from_hours(31 * 24);
const PAD_AFTER: SignedDuration = SignedDuration::from_hours(62 * 24);

/// Day-bucketed occurrence index over a bounded window.
///
/// The index is invalidated wholesale on any write to the event set and
/// rebuilt lazily on the next query; a query outside the current window
/// rebuilds over the enlarged window.
#[derive(Debug, Default)]
pub struct RangeIndex {
    window: Option<(Timestamp, Timestamp)>,
    buckets: BTreeMap<Date, Vec<(EventId, OccurrenceId)>>,
}

impl RangeIndex {
    /// An empty index with no window.
    pub fn new() -> Self {
        RangeIndex::default()
    }

    /// The currently indexed window, if any.
    pub fn window(&self) -> Option<(Timestamp, Timestamp)> {
        self.window
    }

    /// Drops the window and every bucket. The next query rebuilds.
    pub fn invalidate(&mut self) {
        if self.window.is_some() {
            tracing::debug!("invalidating range index");
        }
        self.window = None;
        self.buckets.clear();
    }

    /// Ensures `day` is covered, extending the window and rebuilding when
    /// it is not.
    pub(crate) fn ensure_day(&mut self, events: &BTreeMap<EventId, MasterEvent>, day: Date) {
        let day_start = utc_day_start(day);
        let day_end = utc_day_start(day.tomorrow().unwrap_or(Date::MAX));
        if let Some((window_start, window_end)) = self.window {
            if day_start >= window_start && day_end <= window_end {
                return;
            }
        }
        let mut start = day_start.checked_sub(PAD_BEFORE).unwrap_or(Timestamp::MIN);
        let mut end = day_end.checked_add(PAD_AFTER).unwrap_or(Timestamp::MAX);
        if let Some((window_start, window_end)) = self.window {
            start = start.min(window_start);
            end = end.max(window_end);
        }
        self.rebuild(events, start, end);
    }

    /// Rebuilds every bucket for `[window_start, window_end)`.
    pub(crate) fn rebuild(
        &mut self,
        events: &BTreeMap<EventId, MasterEvent>,
        window_start: Timestamp,
        window_end: Timestamp,
    ) {
        tracing::debug!(%window_start, %window_end, events = events.len(), "rebuilding range index");
        self.buckets.clear();
        for (uid, event) in events {
            for id in occurrence_refs_in_range(event, window_start, window_end) {
                let (start, end) = effective_interval(event, id);
                self.bucket_interval(uid, id, start, end, window_start, window_end);
            }
        }
        self.window = Some((window_start, window_end));
    }

    /// The occurrences touching `day`, in `(event, occurrence)` order.
    /// Empty when the day is uncovered or has no occurrences.
    pub fn bucket(&self, day: Date) -> &[(EventId, OccurrenceId)] {
        self.buckets.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Adds one occurrence to every UTC day its effective interval
    /// touches, clamped to the window. A zero-length occurrence occupies
    /// its start day.
    fn bucket_interval(
        &mut self,
        uid: &EventId,
        id: OccurrenceId,
        start: Timestamp,
        end: Timestamp,
        window_start: Timestamp,
        window_end: Timestamp,
    ) {
        let occupied_end = if end > start {
            end
        } else {
            start.checked_add(SignedDuration::from_secs(1)).unwrap_or(start)
        };
        let clamped_start = start.max(window_start);
        let clamped_end = occupied_end.min(window_end);
        if clamped_end <= clamped_start {
            return;
        }
        let last_instant = clamped_end
            .checked_sub(SignedDuration::from_nanos(1))
            .unwrap_or(clamped_start);
        let mut day = utc_day(clamped_start);
        let last_day = utc_day(last_instant);
        while day <= last_day {
            self.buckets
                .entry(day)
                .or_default()
                .push((uid.clone(), id));
            let Ok(next) = day.tomorrow() else { break };
            day = next;
        }
    }
}

/// The UTC day containing an instant.
pub(crate) fn utc_day(ts: Timestamp) -> Date {
    ts.to_zoned(TimeZone::UTC).date()
}

/// The first instant of a UTC day.
pub(crate) fn utc_day_start(day: Date) -> Timestamp {
    day.at(0, 0, 0, 0)
        .to_zoned(TimeZone::UTC)
        .map(|zoned| zoned.timestamp())
        .unwrap_or(Timestamp::MAX)
}

#[cfg(test)]
mod tests {
    use chimecal_rrule::{Frequency, RuleConfig};
    use jiff::civil::{DateTime, date, datetime};

    use super::*;

    fn ts(dt: DateTime) -> Timestamp {
        dt.to_zoned(TimeZone::UTC).unwrap().timestamp()
    }

    fn event_map(events: Vec<MasterEvent>) -> BTreeMap<EventId, MasterEvent> {
        events
            .into_iter()
            .map(|event| (event.uid().clone(), event))
            .collect()
    }

    #[test]
    fn indexes_non_recurring_event_across_days() {
        // 23:00 to 02:00 the next day.
        let event = MasterEvent::new(
            "late",
            ts(datetime(2024, 1, 1, 23, 0, 0, 0)),
            SignedDuration::from_hours(3),
        );
        let events = event_map(vec![event]);

        let mut index = RangeIndex::new();
        index.ensure_day(&events, date(2024, 1, 1));
        assert_eq!(index.bucket(date(2024, 1, 1)).len(), 1);
        assert_eq!(index.bucket(date(2024, 1, 2)).len(), 1);
        assert!(index.bucket(date(2024, 1, 3)).is_empty());
    }

    #[test]
    fn indexes_recurring_event_within_window() {
        let mut config = RuleConfig::new(Frequency::Daily);
        config.count = Some(3);
        let event = MasterEvent::new(
            "daily",
            ts(datetime(2024, 1, 1, 9, 0, 0, 0)),
            SignedDuration::from_hours(1),
        )
        .with_rule_config(&config)
        .unwrap();
        let events = event_map(vec![event]);

        let mut index = RangeIndex::new();
        index.ensure_day(&events, date(2024, 1, 2));
        assert_eq!(index.bucket(date(2024, 1, 1)).len(), 1);
        assert_eq!(index.bucket(date(2024, 1, 2)).len(), 1);
        assert_eq!(index.bucket(date(2024, 1, 3)).len(), 1);
        assert!(index.bucket(date(2024, 1, 4)).is_empty());
    }

    #[test]
    fn query_outside_window_extends_it() {
        let config = RuleConfig::new(Frequency::Daily);
        let event = MasterEvent::new(
            "daily",
            ts(datetime(2024, 1, 1, 9, 0, 0, 0)),
            SignedDuration::from_hours(1),
        )
        .with_rule_config(&config)
        .unwrap();
        let events = event_map(vec![event]);

        let mut index = RangeIndex::new();
        index.ensure_day(&events, date(2024, 1, 15));
        let (_, first_end) = index.window().unwrap();

        index.ensure_day(&events, date(2024, 8, 15));
        let (second_start, second_end) = index.window().unwrap();
        assert!(second_end > first_end);
        // The old coverage is retained.
        assert!(second_start <= utc_day_start(date(2024, 1, 15)));
        assert_eq!(index.bucket(date(2024, 8, 15)).len(), 1);
        assert_eq!(index.bucket(date(2024, 1, 15)).len(), 1);
    }

    #[test]
    fn invalidate_drops_window_and_buckets() {
        let event = MasterEvent::new(
            "single",
            ts(datetime(2024, 1, 1, 9, 0, 0, 0)),
            SignedDuration::from_hours(1),
        );
        let events = event_map(vec![event]);

        let mut index = RangeIndex::new();
        index.ensure_day(&events, date(2024, 1, 1));
        assert!(index.window().is_some());

        index.invalidate();
        assert!(index.window().is_none());
        assert!(index.bucket(date(2024, 1, 1)).is_empty());
    }

    #[test]
    fn buckets_are_ordered_by_event_then_occurrence() {
        let mk = |uid: &str, hour: i8| {
            let mut config = RuleConfig::new(Frequency::Daily);
            config.count = Some(1);
            MasterEvent::new(
                uid,
                ts(datetime(2024, 1, 1, hour, 0, 0, 0)),
                SignedDuration::from_hours(1),
            )
            .with_rule_config(&config)
            .unwrap()
        };
        let events = event_map(vec![mk("beta", 8), mk("alpha", 12)]);

        let mut index = RangeIndex::new();
        index.ensure_day(&events, date(2024, 1, 1));
        let bucket = index.bucket(date(2024, 1, 1));
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket[0].0.as_str(), "alpha");
        assert_eq!(bucket[1].0.as_str(), "beta");
    }
}
