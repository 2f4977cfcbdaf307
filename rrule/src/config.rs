// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! External configuration vocabulary for recurrence rules.

use std::fmt;
use std::str::FromStr;

use jiff::civil::{DateTime, Weekday};

use crate::Frequency;
use crate::keyword::{
    KW_WEEKDAY_FRIDAY, KW_WEEKDAY_MONDAY, KW_WEEKDAY_SATURDAY, KW_WEEKDAY_SUNDAY,
    KW_WEEKDAY_THURSDAY, KW_WEEKDAY_TUESDAY, KW_WEEKDAY_WEDNESDAY,
};
use crate::spec::RuleError;

/// Recurrence-rule configuration as exchanged with collaborators.
///
/// This is the serialization surface of a rule. Field applicability and
/// value clamping are not enforced here; they are applied once when the
/// configuration is turned into a [`RecurrenceSpec`](crate::RecurrenceSpec).
///
/// On output, `interval = 1` and `firstDayOfWeek = monday` are omitted and
/// empty lists are skipped.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    /// Frequency of recurrence.
    pub frequency: Frequency,

    /// Interval between recurrences, at least 1.
    #[serde(default = "default_interval", skip_serializing_if = "is_default_interval")]
    pub interval: u32,

    /// First day of the week, used for weekly periods and week numbering.
    #[serde(default, skip_serializing_if = "ConfigWeekday::is_monday")]
    pub first_day_of_week: ConfigWeekday,

    /// Day-of-week specifiers, optionally qualified by an occurrence
    /// within the period ("2nd Tuesday").
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_day: Vec<ByDayConfig>,

    /// Day-of-month specifiers, negative values count from the end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_month_day: Vec<i8>,

    /// Month specifiers, "1" through "12".
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "month_strings")]
    pub by_month: Vec<i8>,

    /// Day-of-year specifiers, negative values count from the end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_year_day: Vec<i16>,

    /// Week-number specifiers, negative values count from the end.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_week_no: Vec<i8>,

    /// Hour specifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_hour: Vec<i8>,

    /// Minute specifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_minute: Vec<i8>,

    /// Second specifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_second: Vec<i8>,

    /// Ordinal selection over each period's expanded set, negative values
    /// count from the end. A value of 0 is treated as unset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_set_position: Vec<i32>,

    /// Inclusive end of the recurrence, mutually exclusive with `count`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime>,

    /// Number of occurrences, mutually exclusive with `until`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl RuleConfig {
    /// A configuration with only the frequency set.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: default_interval(),
            first_day_of_week: ConfigWeekday::default(),
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            by_set_position: Vec::new(),
            until: None,
            count: None,
        }
    }
}

fn default_interval() -> u32 {
    1
}

fn is_default_interval(interval: &u32) -> bool {
    *interval == 1
}

/// Day-of-week specifier in the external vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByDayConfig {
    /// Day of the week.
    pub day: ConfigWeekday,

    /// Occurrence within the period, e.g. 2 for "2nd", -1 for "last".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth_of_period: Option<i8>,
}

/// A weekday named by its lowercase English name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigWeekday(pub Weekday);

impl ConfigWeekday {
    fn is_monday(&self) -> bool {
        self.0 == Weekday::Monday
    }

    /// The wire name of this weekday.
    pub fn name(self) -> &'static str {
        match self.0 {
            Weekday::Sunday => KW_WEEKDAY_SUNDAY,
            Weekday::Monday => KW_WEEKDAY_MONDAY,
            Weekday::Tuesday => KW_WEEKDAY_TUESDAY,
            Weekday::Wednesday => KW_WEEKDAY_WEDNESDAY,
            Weekday::Thursday => KW_WEEKDAY_THURSDAY,
            Weekday::Friday => KW_WEEKDAY_FRIDAY,
            Weekday::Saturday => KW_WEEKDAY_SATURDAY,
        }
    }
}

impl Default for ConfigWeekday {
    fn default() -> Self {
        ConfigWeekday(Weekday::Monday)
    }
}

impl From<Weekday> for ConfigWeekday {
    fn from(day: Weekday) -> Self {
        ConfigWeekday(day)
    }
}

impl fmt::Display for ConfigWeekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ConfigWeekday {
    type Err = RuleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let day = match value {
            KW_WEEKDAY_SUNDAY => Weekday::Sunday,
            KW_WEEKDAY_MONDAY => Weekday::Monday,
            KW_WEEKDAY_TUESDAY => Weekday::Tuesday,
            KW_WEEKDAY_WEDNESDAY => Weekday::Wednesday,
            KW_WEEKDAY_THURSDAY => Weekday::Thursday,
            KW_WEEKDAY_FRIDAY => Weekday::Friday,
            KW_WEEKDAY_SATURDAY => Weekday::Saturday,
            _ => return Err(RuleError::UnknownWeekday(value.to_string())),
        };
        Ok(ConfigWeekday(day))
    }
}

impl serde::Serialize for ConfigWeekday {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for ConfigWeekday {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct WeekdayVisitor;

        impl serde::de::Visitor<'_> for WeekdayVisitor {
            type Value = ConfigWeekday;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a lowercase weekday name")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(WeekdayVisitor)
    }
}

/// Months travel as the strings "1" through "12"; numbers are accepted on
/// input for leniency.
mod month_strings {
    use std::fmt;

    use serde::de::{SeqAccess, Visitor};
    use serde::ser::SerializeSeq;

    pub fn serialize<S>(months: &[i8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(months.len()))?;
        for month in months {
            seq.serialize_element(&month.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<i8>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MonthsVisitor;

        impl<'de> Visitor<'de> for MonthsVisitor {
            type Value = Vec<i8>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of months as strings \"1\" through \"12\"")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                struct Month(i8);

                impl<'de> serde::Deserialize<'de> for Month {
                    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                    where
                        D: serde::Deserializer<'de>,
                    {
                        struct MonthVisitor;

                        impl Visitor<'_> for MonthVisitor {
                            type Value = Month;

                            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                                f.write_str("a month as a string or number")
                            }

                            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                            where
                                E: serde::de::Error,
                            {
                                value.parse::<i8>().map(Month).map_err(E::custom)
                            }

                            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
                            where
                                E: serde::de::Error,
                            {
                                i8::try_from(value).map(Month).map_err(E::custom)
                            }

                            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
                            where
                                E: serde::de::Error,
                            {
                                i8::try_from(value).map(Month).map_err(E::custom)
                            }
                        }

                        deserializer.deserialize_any(MonthVisitor)
                    }
                }

                let mut months = Vec::new();
                while let Some(Month(month)) = seq.next_element()? {
                    months.push(month);
                }
                Ok(months)
            }
        }

        deserializer.deserialize_seq(MonthsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_full_vocabulary() {
        let config: RuleConfig = serde_json::from_value(json!({
            "frequency": "yearly",
            "interval": 2,
            "firstDayOfWeek": "sunday",
            "byDay": [{"day": "tuesday", "nthOfPeriod": 2}, {"day": "friday"}],
            "byMonthDay": [1, 15, -1],
            "byMonth": ["1", "6"],
            "byYearDay": [100, -1],
            "byWeekNo": [20, -1],
            "byHour": [9, 17],
            "byMinute": [0, 30],
            "bySecond": [0],
            "bySetPosition": [1, -1],
            "count": 10,
        }))
        .unwrap();

        assert_eq!(config.frequency, Frequency::Yearly);
        assert_eq!(config.interval, 2);
        assert_eq!(config.first_day_of_week.0, Weekday::Sunday);
        assert_eq!(config.by_day.len(), 2);
        assert_eq!(config.by_day[0].day.0, Weekday::Tuesday);
        assert_eq!(config.by_day[0].nth_of_period, Some(2));
        assert_eq!(config.by_day[1].nth_of_period, None);
        assert_eq!(config.by_month, vec![1, 6]);
        assert_eq!(config.by_month_day, vec![1, 15, -1]);
        assert_eq!(config.by_set_position, vec![1, -1]);
        assert_eq!(config.count, Some(10));
        assert!(config.until.is_none());
    }

    #[test]
    fn applies_defaults() {
        let config: RuleConfig = serde_json::from_value(json!({"frequency": "daily"})).unwrap();
        assert_eq!(config.interval, 1);
        assert_eq!(config.first_day_of_week.0, Weekday::Monday);
        assert!(config.by_day.is_empty());
    }

    #[test]
    fn accepts_numeric_months() {
        let config: RuleConfig =
            serde_json::from_value(json!({"frequency": "yearly", "byMonth": [3, "7"]})).unwrap();
        assert_eq!(config.by_month, vec![3, 7]);
    }

    #[test]
    fn omits_defaults_on_output() {
        let config = RuleConfig::new(Frequency::Weekly);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({"frequency": "weekly"}));
    }

    #[test]
    fn serializes_months_as_strings() {
        let mut config = RuleConfig::new(Frequency::Yearly);
        config.by_month = vec![2, 11];
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({"frequency": "yearly", "byMonth": ["2", "11"]}));
    }

    #[test]
    fn parses_until_as_iso8601() {
        let config: RuleConfig = serde_json::from_value(json!({
            "frequency": "daily",
            "until": "1997-12-24T00:00:00",
        }))
        .unwrap();
        assert_eq!(config.until, Some(jiff::civil::datetime(1997, 12, 24, 0, 0, 0, 0)));
    }

    #[test]
    fn round_trips_through_json() {
        let value = json!({
            "frequency": "weekly",
            "interval": 2,
            "firstDayOfWeek": "sunday",
            "byDay": [{"day": "sunday"}, {"day": "tuesday"}],
            "count": 4,
        });
        let config: RuleConfig = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&config).unwrap(), value);
    }
}
