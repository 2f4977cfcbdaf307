// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end behavior of the calendar store: overrides and exclusions
//! composing with a generated series, and the day index staying consistent
//! with writes.

use chimecal_core::{CalendarStore, EventId, MasterEvent, OccurrenceId};
use chimecal_rrule::{Frequency, RuleConfig};
use jiff::civil::{DateTime, date, datetime};
use jiff::tz::TimeZone;
use jiff::{SignedDuration, Timestamp};
use serde_json::json;

fn ts(dt: DateTime) -> Timestamp {
    dt.to_zoned(TimeZone::UTC).unwrap().timestamp()
}

fn occ(dt: DateTime) -> OccurrenceId {
    OccurrenceId::from(ts(dt))
}

/// Daily recurrence with five occurrences starting 2013-10-21, two of them
/// excluded and one retitled.
fn store_with_overrides() -> (CalendarStore, EventId) {
    let mut config = RuleConfig::new(Frequency::Daily);
    config.count = Some(5);
    let event = MasterEvent::new(
        "series",
        ts(datetime(2013, 10, 21, 9, 0, 0, 0)),
        SignedDuration::from_hours(1),
    )
    .with_property("title", json!("standup"))
    .with_rule_config(&config)
    .unwrap();

    let mut store = CalendarStore::new();
    store.insert(event);

    let id = EventId::from("series");
    store.exclude_occurrence(&id, occ(datetime(2013, 10, 22, 9, 0, 0, 0)));
    store.exclude_occurrence(&id, occ(datetime(2013, 10, 24, 9, 0, 0, 0)));
    store.set_occurrence_property(
        &id,
        occ(datetime(2013, 10, 23, 9, 0, 0, 0)),
        "title",
        Some(json!("planning")),
    );
    (store, id)
}

#[test]
fn range_query_composes_overrides_with_series() {
    let (mut store, id) = store_with_overrides();

    let begin = ts(datetime(2013, 10, 20, 0, 0, 0, 0));
    let end = ts(datetime(2013, 10, 27, 0, 0, 0, 0));
    let proxies = store.occurrences_in_range(&id, begin, end);

    let starts: Vec<_> = proxies.iter().map(|proxy| proxy.start()).collect();
    assert_eq!(
        starts,
        vec![
            ts(datetime(2013, 10, 21, 9, 0, 0, 0)),
            ts(datetime(2013, 10, 23, 9, 0, 0, 0)),
            ts(datetime(2013, 10, 25, 9, 0, 0, 0)),
        ]
    );

    let master = store.event(&id).unwrap().clone();
    let titles: Vec<_> = proxies
        .iter()
        .map(|proxy| proxy.get(&master, "title").unwrap())
        .collect();
    assert_eq!(titles, vec![json!("standup"), json!("planning"), json!("standup")]);
}

#[test]
fn day_index_matches_effective_intervals() {
    let (mut store, _) = store_with_overrides();

    assert_eq!(store.events_for_date(date(2013, 10, 21)).len(), 1);
    assert!(store.events_for_date(date(2013, 10, 22)).is_empty());
    assert_eq!(store.events_for_date(date(2013, 10, 23)).len(), 1);
    assert!(store.events_for_date(date(2013, 10, 24)).is_empty());
    assert_eq!(store.events_for_date(date(2013, 10, 25)).len(), 1);
    assert!(store.events_for_date(date(2013, 10, 26)).is_empty());
}

#[test]
fn moved_occurrence_is_indexed_on_its_new_day() {
    let (mut store, id) = store_with_overrides();

    let moved = occ(datetime(2013, 10, 25, 9, 0, 0, 0));
    store.set_occurrence_property(
        &id,
        moved,
        "start",
        Some(json!(ts(datetime(2013, 10, 28, 14, 0, 0, 0)).to_string())),
    );

    assert!(store.events_for_date(date(2013, 10, 25)).is_empty());
    let on_new_day = store.events_for_date(date(2013, 10, 28));
    assert_eq!(on_new_day.len(), 1);
    assert_eq!(on_new_day[0].id(), moved);
    assert_eq!(on_new_day[0].start(), ts(datetime(2013, 10, 28, 14, 0, 0, 0)));
}

#[test]
fn proxy_index_reports_position_in_series() {
    let (mut store, id) = store_with_overrides();
    let master = store.event(&id).unwrap().clone();

    let first = store
        .occurrence(&id, occ(datetime(2013, 10, 21, 9, 0, 0, 0)))
        .unwrap();
    assert_eq!(first.index(&master), 0);

    // Exclusions do not renumber the underlying series.
    let third = store
        .occurrence(&id, occ(datetime(2013, 10, 23, 9, 0, 0, 0)))
        .unwrap();
    assert_eq!(third.index(&master), 2);
}

#[test]
fn master_edit_invalidates_index_and_proxies() {
    let (mut store, id) = store_with_overrides();
    assert_eq!(store.events_for_date(date(2013, 10, 21)).len(), 1);
    assert!(store.index_window().is_some());

    store.update_event(&id, |event| {
        event.set_start(ts(datetime(2013, 11, 4, 9, 0, 0, 0)));
        let mut config = RuleConfig::new(Frequency::Daily);
        config.count = Some(2);
        let rule = chimecal_rrule::RecurrenceSpec::new(&config, event.civil_start()).unwrap();
        event.set_rule(Some(rule));
    });
    assert!(store.index_window().is_none());

    assert!(store.events_for_date(date(2013, 10, 21)).is_empty());
    assert_eq!(store.events_for_date(date(2013, 11, 4)).len(), 1);
    assert_eq!(store.events_for_date(date(2013, 11, 5)).len(), 1);
    assert!(store.events_for_date(date(2013, 11, 6)).is_empty());
}

#[test]
fn multiple_events_share_a_day() {
    let (mut store, _) = store_with_overrides();

    store.insert(MasterEvent::new(
        "single",
        ts(datetime(2013, 10, 21, 15, 0, 0, 0)),
        SignedDuration::from_hours(2),
    ));

    let day = store.events_for_date(date(2013, 10, 21));
    assert_eq!(day.len(), 2);
    assert_eq!(day[0].event_id().as_str(), "series");
    assert_eq!(day[1].event_id().as_str(), "single");
}

#[test]
fn zoned_event_buckets_by_utc_day() {
    // 23:00 in New York on Jan 1 is already Jan 2 in UTC.
    let tz = TimeZone::get("America/New_York").unwrap();
    let start = datetime(2024, 1, 1, 23, 0, 0, 0)
        .to_zoned(tz.clone())
        .unwrap()
        .timestamp();
    let event = MasterEvent::new("ny", start, SignedDuration::from_mins(30)).with_time_zone(tz);

    let mut store = CalendarStore::new();
    store.insert(event);
    assert!(store.events_for_date(date(2024, 1, 1)).is_empty());
    assert_eq!(store.events_for_date(date(2024, 1, 2)).len(), 1);
}
