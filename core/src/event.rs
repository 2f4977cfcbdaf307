// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display};

use chimecal_rrule::{RecurrenceSpec, RuleConfig, RuleError};
use jiff::civil::DateTime;
use jiff::tz::{AmbiguousOffset, TimeZone};
use jiff::{SignedDuration, Timestamp};
use serde_json::{Map, Value};

use crate::overrides::OverrideMap;

/// The name of the typed start property.
pub const PROP_START: &str = "start";

/// The name of the typed duration property.
pub const PROP_DURATION: &str = "duration";

/// The name of the typed time-zone property.
pub const PROP_TIME_ZONE: &str = "timeZone";

/// The unique identifier of a master event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(String);

impl EventId {
    /// Wraps an identifier string.
    pub fn new(uid: impl Into<String>) -> Self {
        EventId(uid.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(uid: &str) -> Self {
        EventId(uid.to_string())
    }
}

impl From<String> for EventId {
    fn from(uid: String) -> Self {
        EventId(uid)
    }
}

/// The event record holding the recurrence rule, the base start and
/// duration, the free-form property map, and the per-occurrence overrides.
///
/// Masters are owned by the [`CalendarStore`](crate::CalendarStore) and are
/// read-only to the occurrence machinery; writes go through the store so
/// caches are invalidated before any subsequent read.
#[derive(Debug, Clone)]
pub struct MasterEvent {
    uid: EventId,
    start: Timestamp,
    duration: SignedDuration,
    time_zone: Option<TimeZone>,
    rule: Option<RecurrenceSpec>,
    properties: Map<String, Value>,
    overrides: OverrideMap,
}

impl MasterEvent {
    /// Creates a non-recurring event.
    pub fn new(uid: impl Into<EventId>, start: Timestamp, duration: SignedDuration) -> Self {
        MasterEvent {
            uid: uid.into(),
            start,
            duration,
            time_zone: None,
            rule: None,
            properties: Map::new(),
            overrides: OverrideMap::default(),
        }
    }

    /// Sets the time zone occurrences are generated in.
    pub fn with_time_zone(mut self, time_zone: TimeZone) -> Self {
        self.time_zone = Some(time_zone);
        self
    }

    /// Attaches an already-normalized recurrence rule.
    pub fn with_rule(mut self, rule: RecurrenceSpec) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Normalizes `config` against this event's start and attaches the
    /// resulting rule.
    pub fn with_rule_config(self, config: &RuleConfig) -> Result<Self, RuleError> {
        let rule = RecurrenceSpec::new(config, self.civil_start())?;
        Ok(self.with_rule(rule))
    }

    /// Sets a free-form property.
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// The unique identifier.
    pub fn uid(&self) -> &EventId {
        &self.uid
    }

    /// The start instant.
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// The event duration.
    pub fn duration(&self) -> SignedDuration {
        self.duration
    }

    /// The configured time zone, if any.
    pub fn time_zone(&self) -> Option<&TimeZone> {
        self.time_zone.as_ref()
    }

    /// The recurrence rule, if the event recurs.
    pub fn rule(&self) -> Option<&RecurrenceSpec> {
        self.rule.as_ref()
    }

    /// The per-occurrence override map.
    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    pub(crate) fn overrides_mut(&mut self) -> &mut OverrideMap {
        &mut self.overrides
    }

    /// Replaces the start instant. The recurrence rule keeps its
    /// normalization; re-attach the rule when the anchor change matters.
    pub fn set_start(&mut self, start: Timestamp) {
        self.start = start;
    }

    /// Replaces the duration.
    pub fn set_duration(&mut self, duration: SignedDuration) {
        self.duration = duration;
    }

    /// Replaces the time zone.
    pub fn set_time_zone(&mut self, time_zone: Option<TimeZone>) {
        self.time_zone = time_zone;
    }

    /// Replaces the recurrence rule.
    pub fn set_rule(&mut self, rule: Option<RecurrenceSpec>) {
        self.rule = rule;
    }

    /// Sets or removes a free-form property on the master itself.
    pub fn set_property(&mut self, name: impl Into<String>, value: Option<Value>) {
        let name = name.into();
        match value {
            Some(value) => {
                self.properties.insert(name, value);
            }
            None => {
                self.properties.remove(&name);
            }
        }
    }

    /// The master's current value for a property. Typed fields are exposed
    /// through the same surface as the free-form map.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            PROP_START => Some(Value::String(self.start.to_string())),
            PROP_DURATION => Some(Value::String(self.duration.to_string())),
            PROP_TIME_ZONE => self
                .time_zone
                .as_ref()
                .and_then(TimeZone::iana_name)
                .map(|name| Value::String(name.to_string())),
            _ => self.properties.get(name).cloned(),
        }
    }

    /// The time zone occurrences are generated in, UTC when unset.
    pub(crate) fn resolved_time_zone(&self) -> TimeZone {
        self.time_zone.clone().unwrap_or(TimeZone::UTC)
    }

    /// The start as a civil datetime in the event's zone, the anchor for
    /// occurrence generation.
    pub fn civil_start(&self) -> DateTime {
        self.start.to_zoned(self.resolved_time_zone()).datetime()
    }

    /// Resolves a generated civil datetime to an instant in the event's
    /// zone. Times repeated by a fold take the earlier instant; times that
    /// fall in a gap do not exist and yield `None`.
    pub(crate) fn resolve_timestamp(&self, dt: DateTime) -> Option<Timestamp> {
        let tz = self.resolved_time_zone();
        match tz.to_ambiguous_zoned(dt).offset() {
            AmbiguousOffset::Unambiguous { offset } => offset.to_timestamp(dt).ok(),
            AmbiguousOffset::Fold { before, .. } => before.to_timestamp(dt).ok(),
            AmbiguousOffset::Gap { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chimecal_rrule::Frequency;
    use jiff::civil::datetime;
    use serde_json::json;

    use super::*;

    fn ts(dt: DateTime) -> Timestamp {
        dt.to_zoned(TimeZone::UTC).unwrap().timestamp()
    }

    #[test]
    fn exposes_typed_fields_as_properties() {
        let start = ts(datetime(2013, 10, 21, 9, 0, 0, 0));
        let event = MasterEvent::new("event-1", start, SignedDuration::from_hours(1))
            .with_property("title", json!("standup"));

        assert_eq!(event.property("title"), Some(json!("standup")));
        assert_eq!(
            event.property(PROP_START),
            Some(Value::String(start.to_string()))
        );
        assert!(event.property(PROP_DURATION).is_some());
        assert_eq!(event.property("missing"), None);
    }

    #[test]
    fn civil_start_uses_event_time_zone() {
        let start = ts(datetime(2024, 6, 1, 12, 0, 0, 0));
        let event = MasterEvent::new("event-1", start, SignedDuration::ZERO)
            .with_time_zone(TimeZone::get("America/New_York").unwrap());
        // Noon UTC is 8am eastern daylight time.
        assert_eq!(event.civil_start(), datetime(2024, 6, 1, 8, 0, 0, 0));
    }

    #[test]
    fn attaches_rule_anchored_at_start() {
        let start = ts(datetime(1997, 1, 31, 9, 0, 0, 0));
        let event = MasterEvent::new("event-1", start, SignedDuration::ZERO)
            .with_rule_config(&RuleConfig::new(Frequency::Monthly))
            .unwrap();
        assert!(event.rule().unwrap().is_complex());
    }

    #[test]
    fn resolves_unambiguous_timestamps() {
        let event = MasterEvent::new(
            "event-1",
            ts(datetime(2024, 1, 1, 0, 0, 0, 0)),
            SignedDuration::ZERO,
        );
        let resolved = event.resolve_timestamp(datetime(2024, 1, 2, 9, 0, 0, 0));
        assert_eq!(resolved, Some(ts(datetime(2024, 1, 2, 9, 0, 0, 0))));
    }

    #[test]
    fn gap_times_are_skipped() {
        let event = MasterEvent::new(
            "event-1",
            ts(datetime(2024, 1, 1, 0, 0, 0, 0)),
            SignedDuration::ZERO,
        )
        .with_time_zone(TimeZone::get("America/New_York").unwrap());
        // 2:30am on the spring-forward day does not exist.
        assert_eq!(event.resolve_timestamp(datetime(2024, 3, 10, 2, 30, 0, 0)), None);
    }
}
