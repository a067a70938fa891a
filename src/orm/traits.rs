//! Core traits for the mapping layer
//!
//! These traits are implemented by `#[derive(Entity)]` from
//! `quickfeather-macros`; value types implement [`FieldType`] by hand.

use std::fmt;
use std::hash::Hash;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;

use super::hydrate::{ColumnValue, HydratedRow};
use super::literal::{aps, pg_array_element_encode, quote_json};
use crate::error::Result;

/// How a declared field type is read from and written to its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Lenient boolean coercion on read.
    Bool,
    Int,
    Float,
    /// Plain text, passed through.
    Text,
    /// A value type constructed from the raw column text.
    Value,
    /// PostgreSQL array text (`{a,b,NULL}`).
    Array,
    /// JSON document.
    Json,
    /// Another entity, hydrated from a JSON-encoded nested payload.
    Entity,
    /// Id-only reference to another entity.
    Reference,
}

/// Column definition for one declared entity field.
///
/// The derive emits one per field, in declaration order.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef<F: 'static> {
    /// Field identifier
    pub field: F,
    /// Logical token used in caller-supplied fragments
    pub name: &'static str,
    /// Table or view the value physically lives in
    pub table: &'static str,
    /// Column name (or expression) inside `table`
    pub column: &'static str,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Join condition for remote columns, written with logical tokens
    pub join: Option<&'static str>,
    /// Whether absence is legal
    pub nullable: bool,
    /// Read/write category of the declared type
    pub kind: FieldKind,
    /// Length bound carried by the declared type
    pub max_length: Option<usize>,
}

/// Closed enumeration of one entity's fields.
pub trait EntityField: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Logical token of the field.
    fn name(self) -> &'static str;

    /// Resolve a logical token back to the field.
    fn from_name(name: &str) -> Option<Self>;
}

/// A row shape the repository can read and write.
///
/// Implemented by `#[derive(Entity)]`.
pub trait Entity: Sized + Send + Sync + 'static {
    /// Type name used in error messages
    const NAME: &'static str;

    /// Primary table or view
    const SOURCE: &'static str;

    type Field: EntityField;

    /// Column definitions in declaration order.
    fn columns() -> &'static [ColumnDef<Self::Field>];

    /// Build the entity from hydrated column values.
    fn from_row(row: HydratedRow) -> Result<Self>;

    /// Dehydrated value of one field.
    fn field_value(&self, field: Self::Field) -> SqlValue;

    /// Primary key value, if the entity has one and it is set.
    fn id(&self) -> Option<i64>;

    /// Whether the entity declares an `id` field.
    fn has_id() -> bool {
        Self::columns().iter().any(|c| c.name == "id")
    }
}

/// A type that can live in an entity field.
pub trait FieldType: Sized {
    const KIND: FieldKind;

    /// Length bound implied by the type itself.
    const MAX_LENGTH: Option<usize> = None;

    /// Hydrate from a non-null column value.
    fn from_column(value: ColumnValue) -> Result<Self>;

    /// Dehydrate into a bindable value.
    fn to_sql_value(&self) -> SqlValue;
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    #[default]
    #[serde(alias = "ASC", alias = "Asc")]
    Asc,
    #[serde(alias = "DESC", alias = "Desc")]
    Desc,
}

impl OrderDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
    TextArray(Vec<Option<String>>),
    /// Text the server casts to `type_name`, e.g. a geometric point.
    Cast {
        text: String,
        type_name: &'static str,
    },
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Placeholder text for the `index`-th bound parameter.
    pub(crate) fn placeholder(&self, index: usize) -> String {
        match self {
            SqlValue::Cast { type_name, .. } => format!("${index}::{type_name}"),
            _ => format!("${index}"),
        }
    }

    /// Escaped literal form, as inlined by the legacy text path.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => super::literal::NULL.to_string(),
            SqlValue::Bool(b) => aps(if *b { "t" } else { "f" }),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Text(s) => aps(s),
            SqlValue::Date(d) => aps(&d.format("%Y-%m-%d").to_string()),
            SqlValue::Time(t) => aps(&t.format("%H:%M:%S").to_string()),
            SqlValue::DateTime(dt) => aps(&dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            SqlValue::Json(v) => quote_json(&v.to_string()),
            SqlValue::TextArray(items) => {
                if items.is_empty() {
                    return super::literal::NULL.to_string();
                }
                aps(&array_text(items))
            }
            SqlValue::Cast { text, type_name } => format!("{}::{}", aps(text), type_name),
        }
    }

    /// Bind this value to a sqlx query.
    pub fn bind_to_query<'q>(
        &self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Decimal(d) => query.bind(*d),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::Time(t) => query.bind(*t),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
            SqlValue::TextArray(items) => query.bind(items.clone()),
            SqlValue::Cast { text, .. } => query.bind(text.clone()),
        }
    }
}

/// Render array elements as PostgreSQL array text, escaping delimiters.
///
/// Empty and missing elements become `NULL`.
pub(crate) fn array_text(items: &[Option<String>]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item.as_deref() {
            None | Some("") => "NULL".to_string(),
            Some(text) => pg_array_element_encode(text),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literals() {
        assert_eq!(SqlValue::Null.to_literal(), "null");
        assert_eq!(SqlValue::Bool(true).to_literal(), "'t'");
        assert_eq!(SqlValue::Bool(false).to_literal(), "'f'");
        assert_eq!(SqlValue::Int(25).to_literal(), "25");
        assert_eq!(SqlValue::Float(1.5).to_literal(), "1.5");
        assert_eq!(
            SqlValue::Text("John's".into()).to_literal(),
            "'John&apos;s'"
        );
        assert_eq!(
            SqlValue::Json(serde_json::json!(["a", "b"])).to_literal(),
            "'[\"a\",\"b\"]'"
        );
        assert_eq!(
            SqlValue::Cast {
                text: "(1.5,2.5)".into(),
                type_name: "point"
            }
            .to_literal(),
            "'(1.5,2.5)'::point"
        );
    }

    #[test]
    fn test_array_literal() {
        let value = SqlValue::TextArray(vec![Some("a,b".into()), None, Some("".into())]);
        assert_eq!(value.to_literal(), "'{a&sbquo;b,NULL,NULL}'");
        assert_eq!(SqlValue::TextArray(vec![]).to_literal(), "null");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(SqlValue::Int(1).placeholder(3), "$3");
        let point = SqlValue::Cast {
            text: "(1,2)".into(),
            type_name: "point",
        };
        assert_eq!(point.placeholder(1), "$1::point");
    }

    #[test]
    fn test_order_direction_deserialize() {
        let dir: OrderDirection = serde_json::from_str("\"DESC\"").unwrap();
        assert_eq!(dir, OrderDirection::Desc);
        assert_eq!(dir.to_sql(), "DESC");
    }
}
