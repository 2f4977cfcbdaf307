// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::SignedDuration;

/// Recurrence frequency.
///
/// Variants are ordered from coarsest to finest, so `Frequency::Daily <
/// Frequency::Hourly` reads as "daily is coarser than hourly".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE")]
#[expect(missing_docs)]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    /// How many consecutive empty periods the generator scans before it
    /// declares the remainder of the rule empty.
    ///
    /// This bounds runtime for rules that match nothing, such as a yearly
    /// rule pinned to February 30th.
    pub(crate) fn empty_period_budget(self) -> u32 {
        match self {
            Frequency::Yearly => 10,
            Frequency::Monthly => 24,
            Frequency::Weekly => 53,
            Frequency::Daily => 366,
            Frequency::Hourly => 48,
            Frequency::Minutely | Frequency::Secondly => 120,
        }
    }

    /// Upper bound on the length of a single period of this frequency.
    ///
    /// Used to clamp an event's duration when computing how far before a
    /// query window an occurrence could start and still reach into it.
    pub fn period_duration(self) -> SignedDuration {
        match self {
            Frequency::Yearly => SignedDuration::from_hours(366 * 24),
            Frequency::Monthly => SignedDuration::from_hours(31 * 24),
            Frequency::Weekly => SignedDuration::from_hours(7 * 24),
            Frequency::Daily => SignedDuration::from_hours(24),
            Frequency::Hourly => SignedDuration::from_hours(1),
            Frequency::Minutely => SignedDuration::from_mins(1),
            Frequency::Secondly => SignedDuration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_coarse_to_fine() {
        assert!(Frequency::Yearly < Frequency::Monthly);
        assert!(Frequency::Daily < Frequency::Hourly);
        assert!(Frequency::Minutely < Frequency::Secondly);
    }

    #[test]
    fn displays_rfc_keywords() {
        assert_eq!(Frequency::Yearly.to_string(), "YEARLY");
        assert_eq!(Frequency::Secondly.to_string(), "SECONDLY");
    }

    #[test]
    fn parses_rfc_keywords() {
        assert_eq!("WEEKLY".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!("FORTNIGHTLY".parse::<Frequency>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Frequency::Monthly).unwrap();
        assert_eq!(json, "\"monthly\"");
        let freq: Frequency = serde_json::from_str("\"daily\"").unwrap();
        assert_eq!(freq, Frequency::Daily);
    }
}
