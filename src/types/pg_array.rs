//! Multi-value column backed by a PostgreSQL text array

use std::fmt;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use super::absent;
use super::filter::Filters;
use super::params::{ParamSource, RequestParams};
use crate::error::{Result as CrateResult, ValueError};
use crate::orm::literal::pg_string_decode;
use crate::orm::{ColumnValue, FieldKind, FieldType, SqlValue};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PgArray {
    values: Vec<Option<String>>,
}

impl PgArray {
    pub const TYPE_NAME: &'static str = "PgArray";

    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Read array column text (`{a,"b c",NULL}`) or a JSON array.
    ///
    /// `{}` is an empty array. Quoted elements keep commas, braces and the
    /// word `NULL`; a backslash takes the next character literally. Only an
    /// unquoted `NULL` is a missing element. Escape markers left by the
    /// literal rendering are reversed in every element.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.starts_with('[') {
            if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(text) {
                return Self::new(items.into_iter().map(json_item).collect());
            }
        }

        let inner = text.strip_prefix('{').unwrap_or(text);
        let inner = inner.strip_suffix('}').unwrap_or(inner);
        if inner.trim().is_empty() {
            return Self::default();
        }
        Self::new(split_elements(inner))
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.values.iter().map(|value| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.values.first().and_then(|value| value.as_deref())
    }

    /// Array text as PostgreSQL prints it; [`PgArray::parse`] reads it back unchanged.
    pub fn to_pg_text(&self) -> String {
        let elements: Vec<String> = self
            .values
            .iter()
            .map(|value| match value.as_deref() {
                None => "NULL".to_string(),
                Some(text) => quote_element(text),
            })
            .collect();
        format!("{{{}}}", elements.join(","))
    }

    /// Filter every element. One element filtered away voids the whole array.
    pub fn from_var(
        values: Option<&[&str]>,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<Self>, ValueError> {
        let Some(values) = values.filter(|values| !values.is_empty()) else {
            return absent(Self::TYPE_NAME, required);
        };
        let mut filtered = Vec::with_capacity(values.len());
        for value in values {
            match filters.apply(value) {
                Some(value) => filtered.push(Some(value)),
                None => return absent(Self::TYPE_NAME, required),
            }
        }
        Ok(Some(Self::new(filtered)))
    }

    pub fn from_post(
        params: &RequestParams,
        identifier: &str,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<Self>, ValueError> {
        let values = params.many(ParamSource::Form, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(values.as_deref(), required, filters)
    }

    pub fn from_get(
        params: &RequestParams,
        identifier: &str,
        required: bool,
        filters: &Filters,
    ) -> Result<Option<Self>, ValueError> {
        let values = params.many(ParamSource::Query, Self::TYPE_NAME, identifier, required)?;
        Self::from_var(values.as_deref(), required, filters)
    }

    pub fn db_transform(&self) -> String {
        self.to_sql_value().to_literal()
    }
}

/// Split the text between the outer braces into elements.
fn split_elements(inner: &str) -> Vec<Option<String>> {
    let mut values = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut element = String::new();
        let mut quoted = false;
        let mut escaped = false;

        if chars.next_if_eq(&'"').is_some() {
            quoted = true;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => element.extend(chars.next()),
                    '"' => break,
                    other => element.push(other),
                }
            }
            while chars.next_if(|c| *c != ',').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                if c == '\\' {
                    escaped = true;
                    element.extend(chars.next());
                } else {
                    element.push(c);
                }
            }
            let trimmed = element.trim_end().len();
            element.truncate(trimmed);
        }

        if !quoted && !escaped && element.eq_ignore_ascii_case("NULL") {
            values.push(None);
        } else {
            values.push(Some(pg_string_decode(&element)));
        }

        if chars.next().is_none() {
            return values;
        }
    }
}

/// Quote an element when PostgreSQL would.
fn quote_element(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ',' | '"' | '\\'));
    if !needs_quotes {
        return text.to_string();
    }
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn json_item(item: serde_json::Value) -> Option<String> {
    match item {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Displays the first element.
impl fmt::Display for PgArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.first().unwrap_or_default())
    }
}

impl Serialize for PgArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl FromIterator<String> for PgArray {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Some).collect())
    }
}

impl FieldType for PgArray {
    const KIND: FieldKind = FieldKind::Array;

    fn from_column(value: ColumnValue) -> CrateResult<Self> {
        match value {
            ColumnValue::Array(array) => Ok(array),
            other => Ok(Self::parse(&other.into_text(Self::TYPE_NAME)?)),
        }
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::TextArray(self.values.clone())
    }
}
