//! Calendar value types backed by `chrono`
//!
//! Display uses Czech formats (`31.12.2024`, `18:30`); SQL literals use ISO.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};

use super::ValueType;
use super::filter::{FilterMode, Filters};
use crate::error::{Result as CrateResult, ValueError};
use crate::orm::{ColumnValue, FieldKind, FieldType, SqlValue};

/// Input filters shared by the calendar types.
///
/// Whitespace is only trimmed so a date and a time can still be told apart.
const CALENDAR_FILTERS: Filters = Filters::new()
    .back_slash(FilterMode::Remove)
    .quote(FilterMode::Remove)
    .white_space(FilterMode::Trim)
    .html(FilterMode::Remove);

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%d. %m. %Y", "%d/%m/%Y"];

const TIME_FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

const DATE_TIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d. %m. %Y %H:%M",
];

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        // timestamptz column text, e.g. `2024-05-01 10:00:00+02`
        .or_else(|| {
            chrono::DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z")
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
        .or_else(|| parse_date(value).and_then(|date| date.and_hms_opt(0, 0, 0)))
}

macro_rules! calendar_type {
    ($name:ident, $inner:ty, $parse:path, $display:literal, $sql:ident, $what:literal) => {
        impl $name {
            pub fn new(value: $inner) -> Self {
                Self(value)
            }

            pub fn value(&self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl ValueType for $name {
            const TYPE_NAME: &'static str = stringify!($name);
            const FILTERS: Filters = CALENDAR_FILTERS;

            fn parse(value: String) -> Result<Self, ValueError> {
                $parse(&value).map(Self).ok_or_else(|| {
                    ValueError::invalid(
                        Self::TYPE_NAME,
                        format!("`{value}` is not a valid {}", $what),
                    )
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.format($display))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.0.serialize(serializer)
            }
        }

        impl FieldType for $name {
            const KIND: FieldKind = FieldKind::Value;

            fn from_column(value: ColumnValue) -> CrateResult<Self> {
                let text = value.into_text(Self::TYPE_NAME)?;
                Ok(Self::parse(text.trim().to_string())?)
            }

            fn to_sql_value(&self) -> SqlValue {
                SqlValue::$sql(self.0)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(NaiveDate);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(NaiveTime);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(NaiveDateTime);

calendar_type!(Date, NaiveDate, parse_date, "%d.%m.%Y", Date, "date");
calendar_type!(Time, NaiveTime, parse_time, "%H:%M", Time, "time");
calendar_type!(
    DateTime,
    NaiveDateTime,
    parse_date_time,
    "%d.%m.%Y %H:%M",
    DateTime,
    "date and time"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::stored_text;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_date() {
        let date = Date::from_var(Some(" 2024-05-01 "), true).unwrap().unwrap();
        assert_eq!(date.to_string(), "01.05.2024");
        assert_eq!(date.db_transform(), "'2024-05-01'");
        assert_eq!(Date::from_var(Some("1.5.2024"), true).unwrap(), Some(date));
        assert_eq!(Date::from_var(Some(""), false).unwrap(), None);
        assert_matches!(
            Date::from_var(Some("31.02.2024"), true),
            Err(ValueError::Type { .. })
        );
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2024-05-01\"");
    }

    #[test]
    fn test_time() {
        let time = Time::from_var(Some("18:30"), true).unwrap().unwrap();
        assert_eq!(time.to_string(), "18:30");
        assert_eq!(time.db_transform(), "'18:30:00'");
        assert_eq!(
            Time::from_column(ColumnValue::Text("18:30:00".into())).unwrap(),
            time
        );
        assert_matches!(
            Time::from_var(Some("25:00"), true),
            Err(ValueError::Type { .. })
        );
    }

    #[test]
    fn test_calendar_values_read_back() {
        let date = Date::from_var(Some(r#""1. 5. 2024""#), true)
            .unwrap()
            .unwrap();
        assert_eq!(date.db_transform(), "'2024-05-01'");
        assert_eq!(
            Date::parse(stored_text(&date.db_transform())).unwrap(),
            date
        );

        let time = Time::from_var(Some("<b>07:05:09</b>"), true)
            .unwrap()
            .unwrap();
        assert_eq!(
            Time::parse(stored_text(&time.db_transform())).unwrap(),
            time
        );

        let value = DateTime::from_var(Some(r"'31.12.2023 23:59:58'\"), true)
            .unwrap()
            .unwrap();
        assert_eq!(value.db_transform(), "'2023-12-31 23:59:58'");
        assert_eq!(
            DateTime::parse(stored_text(&value.db_transform())).unwrap(),
            value
        );
    }

    #[test]
    fn test_date_time() {
        let value = DateTime::from_var(Some("2024-05-01 18:30:15"), true)
            .unwrap()
            .unwrap();
        assert_eq!(value.to_string(), "01.05.2024 18:30");
        assert_eq!(value.db_transform(), "'2024-05-01 18:30:15'");
        assert_eq!(
            DateTime::from_var(Some("1.5.2024 18:30"), true)
                .unwrap()
                .unwrap()
                .to_string(),
            "01.05.2024 18:30"
        );
        assert_eq!(
            DateTime::from_column(ColumnValue::Text("2024-05-01 18:30:15.25+02".into()))
                .unwrap()
                .to_string(),
            "01.05.2024 18:30"
        );
        assert_eq!(
            DateTime::from_var(Some("2024-05-01"), true)
                .unwrap()
                .unwrap()
                .db_transform(),
            "'2024-05-01 00:00:00'"
        );
    }
}
