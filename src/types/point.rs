//! Geographic point stored in a PostgreSQL `point` column

use std::fmt;

use serde::{Serialize, Serializer};

use super::ValueType;
use super::filter::{CaseTransform, Filters};
use crate::error::{Result as CrateResult, ValueError};
use crate::orm::{ColumnValue, FieldKind, FieldType, SqlValue};

/// Latitude and longitude, both positive. The default is the unset `(0,0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    latitude: f64,
    longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValueError> {
        if latitude > 0.0 && longitude > 0.0 {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(ValueError::invalid(
                Self::TYPE_NAME,
                format!("({latitude},{longitude}) is not a valid point"),
            ))
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl ValueType for Point {
    const TYPE_NAME: &'static str = "Point";
    const FILTERS: Filters = Filters::SANITIZE.transform(CaseTransform::Lower);

    /// Parse the `(lat,lon)` text form, optionally prefixed with `POINT`.
    fn parse(value: String) -> Result<Self, ValueError> {
        let text = value.trim();
        let text = match text.get(..5) {
            Some(keyword) if keyword.eq_ignore_ascii_case("point") => text[5..].trim_start(),
            _ => text,
        };
        let inner = text.trim_start_matches('(').trim_end_matches(')');
        let coordinates = inner.split_once(',').and_then(|(lat, lon)| {
            Some((
                lat.trim().parse::<f64>().ok()?,
                lon.trim().parse::<f64>().ok()?,
            ))
        });
        match coordinates {
            Some((latitude, longitude)) => Self::new(latitude, longitude),
            None => Err(ValueError::invalid(
                Self::TYPE_NAME,
                format!("`{value}` is not a valid point"),
            )),
        }
    }

    fn db_transform(&self) -> String {
        format!("POINT ({},{})", self.latitude, self.longitude)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.latitude, self.longitude)
    }
}

/// Serialized as `[lat, lon]`.
impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.latitude, self.longitude).serialize(serializer)
    }
}

impl FieldType for Point {
    const KIND: FieldKind = FieldKind::Value;

    fn from_column(value: ColumnValue) -> CrateResult<Self> {
        Ok(Self::parse(value.into_text(Self::TYPE_NAME)?)?)
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Cast {
            text: self.to_string(),
            type_name: "point",
        }
    }
}
