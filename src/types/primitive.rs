//! Scalar primitives
//!
//! Namespaces for parsing request input into plain `bool`, `i64`, `f64` and
//! `String` values, plus the formatting and string helpers that go with them.

use convert_case::{Case, Casing};
use rand::Rng;
use rand::distributions::Alphanumeric;

use super::filter::{CaseTransform, FilterMode, Filters};
use super::params::{ParamSource, RequestParams};
use super::{absent, filter_value};
use crate::error::ValueError;
use crate::orm::literal;

/// Currency suffixes dropped from numeric input before parsing.
const NUMBER_NOISE: [&str; 3] = [",-", ".-", "Kč"];

fn strip_number_noise(value: &str) -> String {
    let mut value = value.to_string();
    for noise in NUMBER_NOISE {
        value = value.replace(noise, "");
    }
    value.replace(',', ".")
}

/// `number_format`-style rendering with grouped thousands.
fn number_format(
    value: f64,
    decimals: usize,
    decimal_separator: &str,
    thousands_separator: &str,
) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push_str(thousands_separator);
        }
        out.push(c);
    }
    if let Some(fraction) = fraction {
        out.push_str(decimal_separator);
        out.push_str(fraction);
    }
    out
}

// ============================================================================
// Bool
// ============================================================================

pub struct BoolType;

impl BoolType {
    pub const TYPE_NAME: &'static str = "BoolType";

    const FILTERS: Filters = Filters::SANITIZE
        .diacritic(FilterMode::Strip)
        .transform(CaseTransform::Lower);

    fn parse_strict(value: &str) -> Option<bool> {
        match value {
            "1" | "true" | "on" | "yes" => Some(true),
            "0" | "false" | "off" | "no" => Some(false),
            _ => None,
        }
    }

    /// Recognise the usual boolean spellings, including PostgreSQL's `t`/`f`.
    pub fn parse_lenient(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "t" => Some(true),
            "f" => Some(false),
            other => Self::parse_strict(other),
        }
    }

    pub fn from_var(raw: Option<&str>, required: bool) -> Result<Option<bool>, ValueError> {
        let Some(value) = filter_value(Self::TYPE_NAME, raw, required, &Self::FILTERS)? else {
            return Ok(None);
        };
        match Self::parse_strict(&value) {
            Some(b) => Ok(Some(b)),
            None => absent(Self::TYPE_NAME, required),
        }
    }

    /// A checkbox that was not ticked is not sent at all, so absence reads as `false`.
    pub fn from_post(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<bool>, ValueError> {
        match params.single(ParamSource::Form, Self::TYPE_NAME, identifier, false)? {
            Some(raw) => Self::from_var(Some(raw), required),
            None => Ok(Some(false)),
        }
    }

    pub fn from_get(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<bool>, ValueError> {
        let raw = params.single(ParamSource::Query, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }
}

// ============================================================================
// Int
// ============================================================================

pub struct IntType;

impl IntType {
    pub const TYPE_NAME: &'static str = "IntType";

    const FILTERS: Filters = Filters::SANITIZE
        .diacritic(FilterMode::Strip)
        .separator(FilterMode::Remove);

    /// Parse loosely formatted integer input such as `1 000,-` or `100.00`.
    ///
    /// Anything after the first decimal point is dropped.
    pub fn from_var(raw: Option<&str>, required: bool) -> Result<Option<i64>, ValueError> {
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return absent(Self::TYPE_NAME, required);
        };
        let mut value = strip_number_noise(raw);
        if let Some(dot) = value.find('.') {
            value.truncate(dot);
        }
        let Some(value) = filter_value(Self::TYPE_NAME, Some(&value), required, &Self::FILTERS)?
        else {
            return Ok(None);
        };

        let digits = match value.trim_start_matches('0') {
            "" => "0",
            trimmed => trimmed,
        };
        match digits.parse::<i64>() {
            Ok(number) => Ok(Some(number)),
            Err(_) => absent(Self::TYPE_NAME, required),
        }
    }

    pub fn from_post(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<i64>, ValueError> {
        let raw = params.single(ParamSource::Form, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }

    pub fn from_get(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<i64>, ValueError> {
        let raw = params.single(ParamSource::Query, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }

    pub fn format(
        value: i64,
        decimals: usize,
        decimal_separator: &str,
        thousands_separator: &str,
    ) -> String {
        number_format(
            value as f64,
            decimals,
            decimal_separator,
            thousands_separator,
        )
    }
}

// ============================================================================
// Float
// ============================================================================

pub struct FloatType;

impl FloatType {
    pub const TYPE_NAME: &'static str = "FloatType";

    const FILTERS: Filters = Filters::SANITIZE
        .diacritic(FilterMode::Remove)
        .transform(CaseTransform::Lower);

    pub fn from_var(raw: Option<&str>, required: bool) -> Result<Option<f64>, ValueError> {
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return absent(Self::TYPE_NAME, required);
        };
        let value = strip_number_noise(raw);
        let Some(value) = filter_value(Self::TYPE_NAME, Some(&value), required, &Self::FILTERS)?
        else {
            return Ok(None);
        };
        match value.parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Some(number)),
            _ => absent(Self::TYPE_NAME, required),
        }
    }

    pub fn from_post(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<f64>, ValueError> {
        let raw = params.single(ParamSource::Form, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }

    pub fn from_get(
        params: &RequestParams,
        identifier: &str,
        required: bool,
    ) -> Result<Option<f64>, ValueError> {
        let raw = params.single(ParamSource::Query, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required)
    }

    pub fn format(
        value: f64,
        decimals: usize,
        decimal_separator: &str,
        thousands_separator: &str,
    ) -> String {
        number_format(value, decimals, decimal_separator, thousands_separator)
    }

    /// Scale a byte-like quantity by 1024 while it exceeds 512 (`2048 B` -> `2 KB`).
    pub fn unit_convert(value: f64, unit: &str) -> String {
        let mut value = value;
        let mut text = format!("{value} {unit}");
        for prefix in ["K", "M", "G"] {
            if value > 512.0 {
                value /= 1024.0;
                let rounded = (value * 100.0).round() / 100.0;
                text = format!("{rounded} {prefix}{unit}");
            }
        }
        text
    }
}

// ============================================================================
// String
// ============================================================================

pub struct StringType;

impl StringType {
    pub const TYPE_NAME: &'static str = "StringType";

    pub fn from_var(
        raw: Option<&str>,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<String>, ValueError> {
        filter_value(Self::TYPE_NAME, raw, required, filters)
    }

    pub fn from_post(
        params: &RequestParams,
        identifier: &str,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<String>, ValueError> {
        let raw = params.single(ParamSource::Form, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required, filters)
    }

    pub fn from_get(
        params: &RequestParams,
        identifier: &str,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<String>, ValueError> {
        let raw = params.single(ParamSource::Query, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(raw, required, filters)
    }

    /// Random `[0-9a-zA-Z]` string.
    pub fn random_string(length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Text before the last occurrence of `needle`, optionally keeping the needle.
    pub fn string_before<'a>(
        haystack: &'a str,
        needle: &str,
        include_needle: bool,
    ) -> Option<&'a str> {
        let pos = haystack.rfind(needle)?;
        let end = if include_needle {
            pos + needle.len()
        } else {
            pos
        };
        Some(&haystack[..end])
    }

    /// Text after the last occurrence of `needle`.
    pub fn string_after<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
        let pos = haystack.rfind(needle)?;
        Some(&haystack[pos + needle.len()..])
    }

    /// Cut at the first space at or past `max_length` characters and append `delimiter`.
    ///
    /// Text without such a space is returned whole.
    pub fn cut_to_max_length(value: &str, max_length: usize, delimiter: &str) -> String {
        let cut = value
            .char_indices()
            .skip(max_length)
            .find(|(_, c)| *c == ' ')
            .map(|(pos, _)| pos);
        match cut {
            Some(pos) => format!("{}{delimiter}", &value[..pos]),
            None => value.to_string(),
        }
    }

    /// `product_name` -> `productName`, or `ProductName` with `capitalize_first`.
    pub fn to_camel_case(value: &str, capitalize_first: bool) -> String {
        if capitalize_first {
            value.to_case(Case::Pascal)
        } else {
            value.to_case(Case::Camel)
        }
    }

    pub fn to_snake_case(value: &str) -> String {
        value.to_case(Case::Snake)
    }

    pub fn pg_string_encode(value: &str) -> String {
        literal::pg_string_encode(value)
    }

    pub fn pg_string_decode(value: &str) -> String {
        literal::pg_string_decode(value)
    }
}
