// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Occurrence engine for recurring calendar events: master events,
//! per-occurrence override patches, lazily materialized occurrence
//! proxies, and a day-bucketed range index, all owned by a
//! [`CalendarStore`].

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

mod event;
mod index;
mod occurrence;
mod overrides;
mod store;

pub use crate::event::{EventId, MasterEvent, PROP_DURATION, PROP_START, PROP_TIME_ZONE};
pub use crate::index::RangeIndex;
pub use crate::occurrence::{OccurrenceId, OccurrenceProxy};
pub use crate::overrides::{
    OverrideEntry, OverrideMap, PatchSet, apply_patch, compute_diff, escape_token, unescape_token,
};
pub use crate::store::CalendarStore;

pub use chimecal_rrule::{Frequency, RecurrenceSpec, RuleConfig, RuleError};
