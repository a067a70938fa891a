//! Value types
//!
//! Self-validating wrappers around single column values. Each one parses raw
//! external input through the [`Filters`] pipeline, validates its shape and
//! renders itself for display, for the wire (serde) and as a SQL literal.
//!
//! ```ignore
//! let params = RequestParams::new().with_form("phone", "+420 123 456 789");
//! let phone = Phone::from_post(&params, "phone", true)?;
//! assert_eq!(phone.map(|p| p.to_string()).as_deref(), Some("123456789"));
//! ```

use crate::error::ValueError;
use crate::orm::FieldType;

/// Display, wire and column plumbing shared by text-backed value types.
///
/// The type needs `as_str()` and a [`ValueType`] impl.
macro_rules! text_value_type {
    ($ty:ty, $max:expr) => {
        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl $crate::orm::FieldType for $ty {
            const KIND: $crate::orm::FieldKind = $crate::orm::FieldKind::Value;
            const MAX_LENGTH: Option<usize> = $max;

            fn from_column(value: $crate::orm::ColumnValue) -> $crate::error::Result<Self> {
                let text = value.into_text(<$ty as $crate::types::ValueType>::TYPE_NAME)?;
                Ok(<$ty as $crate::types::ValueType>::parse(text)?)
            }

            fn to_sql_value(&self) -> $crate::orm::SqlValue {
                $crate::orm::SqlValue::Text(self.as_str().to_string())
            }
        }
    };
}

mod currency;
mod filter;
mod params;
mod pg_array;
mod point;
mod primitive;
mod string;
mod timestamp;

pub use currency::Currency;
pub use filter::{CaseTransform, FilterMode, Filters};
pub use params::{ParamSource, ParamValue, RequestParams};
pub use pg_array::PgArray;
pub use point::Point;
pub use primitive::{BoolType, FloatType, IntType, StringType};
pub use string::{
    BankCode, BoundedString, Color, DomainResolver, Email, IdNumber, Link, Password, Phone,
    String50, String100, String200, SystemResolver, TaxNumber,
};
pub use timestamp::{Date, DateTime, Time};

/// Contract shared by every structured value type.
pub trait ValueType: FieldType {
    /// Name carried by errors raised for this type
    const TYPE_NAME: &'static str;

    /// Filters applied by [`ValueType::from_var`]
    const FILTERS: Filters;

    /// Validate already filtered text.
    fn parse(value: String) -> Result<Self, ValueError>;

    /// Escaped SQL literal.
    fn db_transform(&self) -> String {
        self.to_sql_value().to_literal()
    }

    /// Filter and parse raw input with caller-chosen filters.
    fn from_var_with(
        raw: Option<&str>,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<Self>, ValueError> {
        match filter_value(Self::TYPE_NAME, raw, required, filters)? {
            Some(value) => Self::parse(value).map(Some),
            None => Ok(None),
        }
    }

    fn from_var(raw: Option<&str>, required: bool) -> Result<Option<Self>, ValueError> {
        Self::from_var_with(raw, required, &Self::FILTERS)
    }

    fn from_post(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<Self>, ValueError> {
        let raw = params.single(ParamSource::Form, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }

    fn from_get(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<Self>, ValueError> {
        let raw = params.single(ParamSource::Query, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }
}

/// Run `filters` over `raw`, turning an empty result into absence or `NullError`.
pub(crate) fn filter_value(
    type_name: &'static str,
    raw: Option<&str>,
    required: bool,
    filters: &Filters,
) -> Result<Option<String>, ValueError> {
    match raw.and_then(|raw| filters.apply(raw)) {
        Some(value) => Ok(Some(value)),
        None => absent(type_name, required),
    }
}

/// Absence of a value, or `NullError` when one is required.
pub(crate) fn absent<T>(type_name: &'static str, required: bool) -> Result<Option<T>, ValueError> {
    if required {
        Err(ValueError::null(type_name))
    } else {
        Ok(None)
    }
}

/// Fail with a length error when `value` is longer than `max` characters.
pub(crate) fn check_length(
    type_name: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValueError> {
    if value.chars().count() > max {
        return Err(ValueError::too_long(type_name, max));
    }
    Ok(())
}

/// Column text as the server stores an inlined literal: the surrounding
/// quotes and any `::type` cast are gone, escape markers stay.
#[cfg(test)]
pub(crate) fn stored_text(literal: &str) -> String {
    let literal = match literal.rsplit_once("'::") {
        Some((value, _)) => &literal[..value.len() + 1],
        None => literal,
    };
    literal
        .strip_prefix('\'')
        .and_then(|l| l.strip_suffix('\''))
        .unwrap_or(literal)
        .to_string()
}
