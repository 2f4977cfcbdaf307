// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Explicit ownership of master events, their materialized occurrence
//! proxies, and the range index.

use std::collections::BTreeMap;
use std::sync::Arc;

use jiff::Timestamp;
use jiff::civil::Date;
use serde_json::Value;

use crate::event::{EventId, MasterEvent};
use crate::index::RangeIndex;
use crate::occurrence::{
    OccurrenceId, OccurrenceProxy, occurrence_refs_in_range, resolve_property,
};
use crate::overrides;

/// Owns the event set and every cache derived from it.
///
/// All mutations pass through the store and invalidate the affected
/// caches synchronously, before any subsequent read can observe them;
/// mixing stale generation dates with fresh override data is therefore
/// impossible. External collaborators that mutate events elsewhere call
/// [`CalendarStore::invalidate_event`] with the same guarantee.
#[derive(Debug, Default)]
pub struct CalendarStore {
    events: BTreeMap<EventId, MasterEvent>,
    proxies: BTreeMap<(EventId, OccurrenceId), Arc<OccurrenceProxy>>,
    index: RangeIndex,
}

impl CalendarStore {
    /// An empty store.
    pub fn new() -> Self {
        CalendarStore::default()
    }

    /// The number of events in the store.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The master event for `id`, if present.
    pub fn event(&self, id: &EventId) -> Option<&MasterEvent> {
        self.events.get(id)
    }

    /// Inserts or replaces an event.
    pub fn insert(&mut self, event: MasterEvent) {
        let uid = event.uid().clone();
        self.events.insert(uid.clone(), event);
        self.invalidate_event(&uid);
    }

    /// Removes an event. Its index entries are stale from this moment and
    /// dropped by the rebuild triggered here.
    pub fn remove(&mut self, id: &EventId) -> Option<MasterEvent> {
        let removed = self.events.remove(id);
        if removed.is_some() {
            self.invalidate_event(id);
        }
        removed
    }

    /// Applies `edit` to an event and invalidates its caches before
    /// returning. Returns false when the event is unknown.
    pub fn update_event(&mut self, id: &EventId, edit: impl FnOnce(&mut MasterEvent)) -> bool {
        let Some(event) = self.events.get_mut(id) else {
            return false;
        };
        edit(event);
        self.invalidate_event(id);
        true
    }

    /// Entry point for collaborators that changed a recurrence-relevant
    /// attribute out of band: drops every proxy of the event (their
    /// generation-date identities are meaningless now) and the range
    /// index.
    pub fn invalidate_event(&mut self, id: &EventId) {
        tracing::debug!(event = %id, "invalidating occurrence caches");
        self.proxies.retain(|(event, _), _| event != id);
        self.index.invalidate();
    }

    /// Overrides one property of one occurrence. `None` deletes the
    /// property for that occurrence.
    pub fn set_occurrence_property(
        &mut self,
        id: &EventId,
        occurrence: OccurrenceId,
        property: &str,
        value: Option<Value>,
    ) -> bool {
        let Some(event) = self.events.get_mut(id) else {
            return false;
        };
        overrides::set_occurrence_property(event, occurrence, property, value.as_ref());
        self.proxies.remove(&(id.clone(), occurrence));
        self.index.invalidate();
        true
    }

    /// Excludes one occurrence from its series, replacing any patch.
    pub fn exclude_occurrence(&mut self, id: &EventId, occurrence: OccurrenceId) -> bool {
        let Some(event) = self.events.get_mut(id) else {
            return false;
        };
        event.overrides_mut().exclude(occurrence);
        self.proxies.remove(&(id.clone(), occurrence));
        self.index.invalidate();
        true
    }

    /// The proxy for one occurrence, created lazily and cached under its
    /// `(event, occurrence)` key. `None` for unknown events and excluded
    /// occurrences.
    pub fn occurrence(
        &mut self,
        id: &EventId,
        occurrence: OccurrenceId,
    ) -> Option<Arc<OccurrenceProxy>> {
        let key = (id.clone(), occurrence);
        if let Some(proxy) = self.proxies.get(&key) {
            return Some(Arc::clone(proxy));
        }
        let event = self.events.get(id)?;
        if event.overrides().is_excluded(occurrence) {
            return None;
        }
        let proxy = Arc::new(OccurrenceProxy::materialize(event, occurrence));
        self.proxies.insert(key, Arc::clone(&proxy));
        Some(proxy)
    }

    /// Resolves one property of one occurrence without materializing a
    /// proxy.
    pub fn occurrence_property(
        &self,
        id: &EventId,
        occurrence: OccurrenceId,
        property: &str,
    ) -> Option<Value> {
        let event = self.events.get(id)?;
        resolve_property(event, occurrence, property)
    }

    /// Every occurrence of `id` whose effective interval may intersect
    /// `[begin, end)`: the generated series overlaid with override
    /// insertions, minus exclusions.
    pub fn occurrences_in_range(
        &mut self,
        id: &EventId,
        begin: Timestamp,
        end: Timestamp,
    ) -> Vec<Arc<OccurrenceProxy>> {
        let refs = match self.events.get(id) {
            Some(event) => occurrence_refs_in_range(event, begin, end),
            None => return Vec::new(),
        };
        refs.into_iter()
            .filter_map(|occurrence| self.occurrence(id, occurrence))
            .collect()
    }

    /// The occurrences touching one UTC day, from the range index. The
    /// window is extended (and the index rebuilt) when the day is not yet
    /// covered.
    pub fn events_for_date(&mut self, day: Date) -> Vec<Arc<OccurrenceProxy>> {
        self.index.ensure_day(&self.events, day);
        let refs: Vec<_> = self.index.bucket(day).to_vec();
        refs.into_iter()
            .filter_map(|(event, occurrence)| self.occurrence(&event, occurrence))
            .collect()
    }

    /// The currently indexed window, if a query has built one.
    pub fn index_window(&self) -> Option<(Timestamp, Timestamp)> {
        self.index.window()
    }
}

#[cfg(test)]
mod tests {
    use chimecal_rrule::{Frequency, RuleConfig};
    use jiff::SignedDuration;
    use jiff::civil::{DateTime, date, datetime};
    use jiff::tz::TimeZone;
    use serde_json::json;

    use super::*;

    fn ts(dt: DateTime) -> Timestamp {
        dt.to_zoned(TimeZone::UTC).unwrap().timestamp()
    }

    fn daily_event(uid: &str, count: u32) -> MasterEvent {
        let mut config = RuleConfig::new(Frequency::Daily);
        config.count = Some(count);
        MasterEvent::new(
            uid,
            ts(datetime(2013, 10, 21, 9, 0, 0, 0)),
            SignedDuration::from_hours(1),
        )
        .with_property("title", json!("standup"))
        .with_rule_config(&config)
        .unwrap()
    }

    #[test]
    fn proxies_are_cached_per_occurrence() {
        let mut store = CalendarStore::new();
        store.insert(daily_event("event-1", 5));
        let id = EventId::from("event-1");
        let occurrence = OccurrenceId::from(ts(datetime(2013, 10, 22, 9, 0, 0, 0)));

        let first = store.occurrence(&id, occurrence).unwrap();
        let second = store.occurrence(&id, occurrence).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn update_invalidates_cached_proxies() {
        let mut store = CalendarStore::new();
        store.insert(daily_event("event-1", 5));
        let id = EventId::from("event-1");
        let occurrence = OccurrenceId::from(ts(datetime(2013, 10, 22, 9, 0, 0, 0)));
        let before = store.occurrence(&id, occurrence).unwrap();

        store.update_event(&id, |event| {
            event.set_start(ts(datetime(2013, 10, 21, 10, 0, 0, 0)));
        });
        let after = store.occurrence(&id, occurrence).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn excluded_occurrence_has_no_proxy() {
        let mut store = CalendarStore::new();
        store.insert(daily_event("event-1", 5));
        let id = EventId::from("event-1");
        let occurrence = OccurrenceId::from(ts(datetime(2013, 10, 22, 9, 0, 0, 0)));

        assert!(store.occurrence(&id, occurrence).is_some());
        store.exclude_occurrence(&id, occurrence);
        assert!(store.occurrence(&id, occurrence).is_none());
    }

    #[test]
    fn unknown_event_yields_nothing() {
        let mut store = CalendarStore::new();
        let id = EventId::from("ghost");
        assert!(store.occurrence(&id, OccurrenceId::from(Timestamp::UNIX_EPOCH)).is_none());
        assert!(
            store
                .occurrences_in_range(&id, Timestamp::UNIX_EPOCH, Timestamp::MAX)
                .is_empty()
        );
        assert!(!store.exclude_occurrence(&id, OccurrenceId::from(Timestamp::UNIX_EPOCH)));
    }

    #[test]
    fn events_for_date_reflects_writes() {
        let mut store = CalendarStore::new();
        store.insert(daily_event("event-1", 5));
        let day = date(2013, 10, 22);
        assert_eq!(store.events_for_date(day).len(), 1);

        let id = EventId::from("event-1");
        store.exclude_occurrence(&id, OccurrenceId::from(ts(datetime(2013, 10, 22, 9, 0, 0, 0))));
        assert!(store.events_for_date(day).is_empty());

        store.remove(&id);
        assert!(store.events_for_date(date(2013, 10, 21)).is_empty());
    }
}
