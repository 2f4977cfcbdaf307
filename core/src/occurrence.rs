// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Concrete occurrences of a recurring event, resolved through the
//! override store with the master event as fallback.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use jiff::{SignedDuration, Timestamp};
use serde_json::Value;

use crate::event::{EventId, MasterEvent, PROP_DURATION, PROP_START};
use crate::overrides::{OverrideEntry, apply_patch, escape_token};

/// The identity of one occurrence: the instant of its *unmodified*
/// generation date, resolved through the event's time zone.
///
/// The identity stays stable even when the occurrence's own start is
/// overridden, so a patch keeps addressing the same slot in the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OccurrenceId(Timestamp);

impl OccurrenceId {
    /// Wraps a generation instant.
    pub fn from_timestamp(ts: Timestamp) -> Self {
        OccurrenceId(ts)
    }

    /// The generation instant.
    pub fn timestamp(self) -> Timestamp {
        self.0
    }
}

impl From<Timestamp> for OccurrenceId {
    fn from(ts: Timestamp) -> Self {
        OccurrenceId(ts)
    }
}

impl Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A view of one occurrence with the same property surface as its master.
///
/// Proxies are materialized lazily by the
/// [`CalendarStore`](crate::CalendarStore) and cached per
/// `(event, occurrence)` key. Any change to the master's start, time zone,
/// or rule invalidates every proxy of that event, since generation-date
/// identities are no longer meaningful afterwards.
#[derive(Debug, Clone)]
pub struct OccurrenceProxy {
    event: EventId,
    id: OccurrenceId,
    start: Timestamp,
    end: Timestamp,
}

impl OccurrenceProxy {
    pub(crate) fn materialize(master: &MasterEvent, id: OccurrenceId) -> Self {
        let (start, end) = effective_interval(master, id);
        OccurrenceProxy {
            event: master.uid().clone(),
            id,
            start,
            end,
        }
    }

    /// The owning event.
    pub fn event_id(&self) -> &EventId {
        &self.event
    }

    /// The stable occurrence identity.
    pub fn id(&self) -> OccurrenceId {
        self.id
    }

    /// The effective start, with any override applied.
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// The effective end (exclusive), with any override applied.
    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Resolves a property through the override store, falling back to the
    /// master's current value.
    pub fn get(&self, master: &MasterEvent, property: &str) -> Option<Value> {
        resolve_property(master, self.id, property)
    }

    /// The ordinal position of this occurrence in the master's full
    /// sequence. The first occurrence is index 0.
    pub fn index(&self, master: &MasterEvent) -> usize {
        if self.id.timestamp() == master.start() {
            return 0;
        }
        let Some(rule) = master.rule() else {
            return 0;
        };
        let civil = self
            .id
            .timestamp()
            .to_zoned(master.resolved_time_zone())
            .datetime();
        rule.occurrences_between(master.civil_start(), None, None)
            .binary_search(&civil)
            .unwrap_or_else(|insert| insert)
    }
}

/// The occurrence's *original* value for a property: the master's current
/// value, except start and duration, whose originals are re-derived from
/// the generation date.
pub(crate) fn original_value(
    master: &MasterEvent,
    id: OccurrenceId,
    property: &str,
) -> Option<Value> {
    match property {
        PROP_START => Some(Value::String(id.timestamp().to_string())),
        PROP_DURATION => Some(Value::String(master.duration().to_string())),
        _ => master.property(property),
    }
}

/// One generic resolution path for every property: when a patch exists at
/// or beneath the property, apply it to a clone of the original value;
/// otherwise hand back the original as is.
pub(crate) fn resolve_property(
    master: &MasterEvent,
    id: OccurrenceId,
    property: &str,
) -> Option<Value> {
    let original = original_value(master, id, property);
    let Some(OverrideEntry::Patched(patch)) = master.overrides().entry(id) else {
        return original;
    };
    let base = escape_token(property);
    if !patch.affects(&base) {
        return original;
    }
    let mut value = original;
    for (relative, patched) in patch.entries_under(&base) {
        value = apply_patch(value, relative, patched);
    }
    value
}

/// The occurrence's effective `[start, end)` interval, override-resolved.
pub(crate) fn effective_interval(master: &MasterEvent, id: OccurrenceId) -> (Timestamp, Timestamp) {
    let start = resolve_property(master, id, PROP_START)
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|text| text.parse::<Timestamp>().ok())
        .unwrap_or_else(|| id.timestamp());
    let duration = resolve_property(master, id, PROP_DURATION)
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|text| text.parse::<SignedDuration>().ok())
        .unwrap_or_else(|| master.duration());
    let end = start.checked_add(duration).unwrap_or(start);
    (start, end.max(start))
}

/// Every occurrence of `master` whose effective interval intersects
/// `[begin, end)`: the generated series overlaid with override insertions,
/// minus exclusions.
pub(crate) fn occurrence_refs_in_range(
    master: &MasterEvent,
    begin: Timestamp,
    end: Timestamp,
) -> Vec<OccurrenceId> {
    let mut ids = BTreeSet::new();
    match master.rule() {
        None => {
            ids.insert(OccurrenceId::from(master.start()));
        }
        Some(rule) => {
            // An occurrence can reach into the range from at most one
            // period's worth of duration before it.
            let bounded = master
                .duration()
                .max(SignedDuration::ZERO)
                .min(rule.frequency().period_duration());
            let earliest = begin
                .checked_sub(bounded)
                .and_then(|ts| ts.checked_add(SignedDuration::from_secs(1)))
                .unwrap_or(Timestamp::MIN);
            let tz = master.resolved_time_zone();
            let begin_civil = earliest.to_zoned(tz.clone()).datetime();
            let end_civil = end.to_zoned(tz).datetime();
            for dt in rule.occurrences_between(master.civil_start(), Some(begin_civil), Some(end_civil))
            {
                if let Some(ts) = master.resolve_timestamp(dt) {
                    ids.insert(OccurrenceId::from(ts));
                }
            }
        }
    }

    // Overridden occurrences can move into the range from anywhere in the
    // series; excluded ones disappear from it.
    for (id, entry) in master.overrides().iter() {
        match entry {
            OverrideEntry::Excluded => {
                ids.remove(&id);
            }
            OverrideEntry::Patched(_) => {
                ids.insert(id);
            }
        }
    }

    ids.into_iter()
        .filter(|id| !master.overrides().is_excluded(*id))
        .filter(|id| {
            let (start, end_ts) = effective_interval(master, *id);
            intersects(start, end_ts, begin, end)
        })
        .collect()
}

/// Interval intersection, treating a zero-length occurrence as occupying
/// its start instant.
fn intersects(start: Timestamp, end: Timestamp, range_begin: Timestamp, range_end: Timestamp) -> bool {
    if start >= range_end {
        return false;
    }
    if start == end {
        return start >= range_begin;
    }
    end > range_begin
}
