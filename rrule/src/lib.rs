// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Recurrence rules and occurrence generation for calendar events.
//!
//! A [`RuleConfig`] is the external vocabulary of an RFC 5545-style
//! recurrence rule. Constructing a [`RecurrenceSpec`] from it normalizes
//! the rule once against its anchor date; the spec then generates concrete
//! occurrence datetimes in civil time, one period at a time.

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

mod config;
mod freq;
mod generate;
mod keyword;
mod spec;
mod weekdate;

pub use crate::config::{ByDayConfig, ConfigWeekday, RuleConfig};
pub use crate::freq::Frequency;
pub use crate::generate::Period;
pub use crate::spec::{ByWeekday, RecurrenceSpec, RuleError, Terminator};

/// Hard cap on the number of occurrences a single query returns, and the
/// ceiling a rule's `count` is clamped to.
pub const MAX_OCCURRENCES: usize = 16384;
