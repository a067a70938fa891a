//! Hydration and dehydration
//!
//! Rows arrive as text keyed by logical name. Each fetched property is turned
//! into a [`ColumnValue`] according to its [`FieldKind`], collected into a
//! [`HydratedRow`] and handed to the entity's generated `from_row`.
//!
//! Remote properties typed as another entity hold a JSON payload of one record
//! or an array of records. Record keys are qualified with the nested entity's
//! table name, matched against the nested entity's physical columns and the
//! record is hydrated through the nested entity's own metadata.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

use super::metadata::{EntityMetadata, PropertyMetadata, load_properties};
use super::traits::{Entity, FieldKind, FieldType, SqlValue};
use crate::error::{EntityError, Error, Result, ValueError};
use crate::types::{BoolType, PgArray};

/// One row as it crosses the executor seam: column alias to optional text.
pub type RawRow = HashMap<String, Option<String>>;

/// One decoded nested record, keyed by bare column name.
pub type NestedRecord = serde_json::Map<String, serde_json::Value>;

/// Non-null column value, pre-shaped by the property's [`FieldKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Bool(bool),
    Array(PgArray),
    Json(serde_json::Value),
    Records(Vec<NestedRecord>),
}

impl ColumnValue {
    /// Textual form, for types that parse from text.
    pub fn into_text(self, type_name: &'static str) -> Result<String> {
        match self {
            ColumnValue::Text(text) => Ok(text),
            ColumnValue::Bool(b) => Ok(b.to_string()),
            ColumnValue::Array(array) => Ok(array.to_pg_text()),
            ColumnValue::Json(serde_json::Value::String(text)) => Ok(text),
            ColumnValue::Json(value) => Ok(value.to_string()),
            ColumnValue::Records(_) => {
                Err(ValueError::invalid(type_name, "nested records cannot be read as text").into())
            }
        }
    }
}

/// Column values of one row, taken out field by field by `Entity::from_row`.
#[derive(Debug)]
pub struct HydratedRow {
    entity: &'static str,
    values: HashMap<&'static str, ColumnValue>,
}

impl HydratedRow {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            values: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &'static str, value: ColumnValue) {
        self.values.insert(name, value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Take a field that may be absent.
    pub fn optional<T: FieldType>(&mut self, name: &'static str) -> Result<Option<T>> {
        match self.values.remove(name) {
            None => Ok(None),
            Some(value) => T::from_column(value)
                .map(Some)
                .map_err(|e| self.field_error(name, e)),
        }
    }

    /// Take a field that must be present.
    pub fn required<T: FieldType>(&mut self, name: &'static str) -> Result<T> {
        match self.optional(name)? {
            Some(value) => Ok(value),
            None => Err(
                EntityError::for_field(self.entity, name, format!("`{name}` is missing")).into(),
            ),
        }
    }

    fn field_error(&self, name: &'static str, error: Error) -> Error {
        match error {
            Error::Value(e) => EntityError::for_field(self.entity, name, e.to_string()).into(),
            Error::Json(e) => EntityError::for_field(self.entity, name, e.to_string()).into(),
            other => other,
        }
    }
}

/// Hydrate one top-level row. Remote properties not in `fetched` stay absent.
pub(crate) fn hydrate_row<E: Entity>(
    metadata: &EntityMetadata<E::Field>,
    row: &RawRow,
    fetched: &[E::Field],
) -> Result<E> {
    hydrate_with::<E, _>(metadata, |property| {
        if property.is_remote && !fetched.contains(&property.field) {
            return None;
        }
        row.get(property.name).cloned().flatten()
    })
}

fn hydrate_with<E, L>(metadata: &EntityMetadata<E::Field>, mut lookup: L) -> Result<E>
where
    E: Entity,
    L: FnMut(&PropertyMetadata<E::Field>) -> Option<String>,
{
    let mut row = HydratedRow::new(E::NAME);
    for property in metadata.properties() {
        let Some(text) = lookup(property) else {
            continue;
        };
        if let Some(value) = column_value(E::NAME, property, text)? {
            row.insert(property.name, value);
        }
    }
    E::from_row(row)
}

fn column_value<F>(
    entity: &'static str,
    property: &PropertyMetadata<F>,
    text: String,
) -> Result<Option<ColumnValue>> {
    let value = match property.kind {
        FieldKind::Bool => match BoolType::parse_lenient(&text) {
            Some(b) => ColumnValue::Bool(b),
            None => {
                return Err(EntityError::for_field(
                    entity,
                    property.name,
                    format!("`{text}` is not a boolean"),
                )
                .into());
            }
        },
        FieldKind::Array => ColumnValue::Array(PgArray::parse(&text)),
        FieldKind::Json => ColumnValue::Json(
            serde_json::from_str(&text)
                .map_err(|e| EntityError::for_field(entity, property.name, e.to_string()))?,
        ),
        FieldKind::Entity => {
            let records = decode_nested(&text)
                .map_err(|e| EntityError::for_field(entity, property.name, e.to_string()))?;
            if records.is_empty() {
                return Ok(None);
            }
            ColumnValue::Records(records)
        }
        _ => ColumnValue::Text(text),
    };
    Ok(Some(value))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NestedPayload {
    Many(Vec<Option<NestedRecord>>),
    One(NestedRecord),
}

/// Decode a nested payload. `null` entries (an aggregate over no rows) are dropped.
pub fn decode_nested(text: &str) -> Result<Vec<NestedRecord>, serde_json::Error> {
    let payload: Option<NestedPayload> = serde_json::from_str(text)?;
    Ok(match payload {
        None => Vec::new(),
        Some(NestedPayload::Many(records)) => records.into_iter().flatten().collect(),
        Some(NestedPayload::One(record)) => vec![record],
    })
}

fn json_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Hydrate nested records through `T`'s metadata.
pub fn hydrate_nested<T: Entity>(records: Vec<NestedRecord>) -> Result<Vec<T>> {
    let metadata = load_properties::<T>()?;
    let table = T::SOURCE.rsplit('.').next().unwrap_or(T::SOURCE);

    records
        .into_iter()
        .map(|record| {
            let qualified: RawRow = record
                .into_iter()
                .map(|(key, value)| (format!("{table}.{key}"), json_text(value)))
                .collect();

            hydrate_with::<T, _>(&metadata, |property| {
                if property.is_remote {
                    return None;
                }
                qualified
                    .iter()
                    .find(|(key, _)| property.matches_qualified(key))
                    .and_then(|(_, value)| value.clone())
                    .or_else(|| {
                        qualified
                            .get(&format!("{table}.{}", property.name))
                            .cloned()
                            .flatten()
                    })
            })
        })
        .collect()
}

/// Hydrate exactly one nested record into `T`.
pub fn hydrate_nested_one<T: Entity>(value: ColumnValue) -> Result<T> {
    let mut entities = hydrate_nested::<T>(nested_records(value, T::NAME)?)?;
    match entities.len() {
        1 => entities
            .pop()
            .ok_or_else(|| EntityError::new(T::NAME, "nested record vanished").into()),
        n => {
            Err(EntityError::new(T::NAME, format!("expected one nested record, found {n}")).into())
        }
    }
}

fn nested_records(value: ColumnValue, type_name: &'static str) -> Result<Vec<NestedRecord>> {
    match value {
        ColumnValue::Records(records) => Ok(records),
        ColumnValue::Text(text) => Ok(decode_nested(&text)?),
        ColumnValue::Json(json) => Ok(decode_nested(&json.to_string())?),
        _ => Err(ValueError::invalid(type_name, "expected a nested record payload").into()),
    }
}

/// Dehydrate one field value.
pub fn dehydrate<T: FieldType>(value: &T) -> SqlValue {
    value.to_sql_value()
}

/// Dehydrate an optional field value; absence becomes `NULL`.
pub fn dehydrate_optional<T: FieldType>(value: &Option<T>) -> SqlValue {
    match value {
        Some(v) => v.to_sql_value(),
        None => SqlValue::Null,
    }
}

/// Primary-key shapes an entity may declare.
pub trait IdValue {
    fn id_value(&self) -> Option<i64>;
}

impl IdValue for i64 {
    fn id_value(&self) -> Option<i64> {
        Some(*self)
    }
}

impl IdValue for i32 {
    fn id_value(&self) -> Option<i64> {
        Some(i64::from(*self))
    }
}

impl<T: IdValue> IdValue for Option<T> {
    fn id_value(&self) -> Option<i64> {
        self.as_ref().and_then(IdValue::id_value)
    }
}

// ============================================================================
// Primitive field types
// ============================================================================

fn parse_text<T: std::str::FromStr>(value: ColumnValue, type_name: &'static str) -> Result<T> {
    let text = value.into_text(type_name)?;
    text.trim().parse().map_err(|_| {
        ValueError::invalid(type_name, format!("`{text}` is not a valid {type_name}")).into()
    })
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn from_column(value: ColumnValue) -> Result<Self> {
        match value {
            ColumnValue::Bool(b) => Ok(b),
            other => {
                let text = other.into_text("bool")?;
                BoolType::parse_lenient(&text).ok_or_else(|| {
                    ValueError::invalid("bool", format!("`{text}` is not a boolean")).into()
                })
            }
        }
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl FieldType for i64 {
    const KIND: FieldKind = FieldKind::Int;

    fn from_column(value: ColumnValue) -> Result<Self> {
        parse_text(value, "i64")
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

impl FieldType for i32 {
    const KIND: FieldKind = FieldKind::Int;

    fn from_column(value: ColumnValue) -> Result<Self> {
        parse_text(value, "i32")
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }
}

impl FieldType for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn from_column(value: ColumnValue) -> Result<Self> {
        parse_text(value, "f64")
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl FieldType for Decimal {
    const KIND: FieldKind = FieldKind::Value;

    fn from_column(value: ColumnValue) -> Result<Self> {
        parse_text(value, "Decimal")
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Decimal(*self)
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn from_column(value: ColumnValue) -> Result<Self> {
        value.into_text("String")
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl FieldType for serde_json::Value {
    const KIND: FieldKind = FieldKind::Json;

    fn from_column(value: ColumnValue) -> Result<Self> {
        match value {
            ColumnValue::Json(json) => Ok(json),
            other => Ok(serde_json::from_str(&other.into_text("Json")?)?),
        }
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Json(self.clone())
    }
}

/// A remote property holding many nested records. Never written back.
impl<T: Entity> FieldType for Vec<T> {
    const KIND: FieldKind = FieldKind::Entity;

    fn from_column(value: ColumnValue) -> Result<Self> {
        hydrate_nested::<T>(nested_records(value, T::NAME)?)
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Null
    }
}

/// Id-only reference to another entity.
pub struct ForeignKey<E> {
    id: i64,
    entity: PhantomData<fn() -> E>,
}

impl<E> ForeignKey<E> {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            entity: PhantomData,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl<E> Clone for ForeignKey<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for ForeignKey<E> {}

impl<E> PartialEq for ForeignKey<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for ForeignKey<E> {}

impl<E> fmt::Debug for ForeignKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ForeignKey").field(&self.id).finish()
    }
}

impl<E> fmt::Display for ForeignKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<E> Serialize for ForeignKey<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.id)
    }
}

impl<E: Entity> FieldType for ForeignKey<E> {
    const KIND: FieldKind = FieldKind::Reference;

    fn from_column(value: ColumnValue) -> Result<Self> {
        parse_text(value, E::NAME).map(Self::new)
    }

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::fixtures::{Category, Product, ProductField};
    use crate::types::BoundedString;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn raw(pairs: &[(&str, Option<&str>)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn test_hydrate_local_columns() {
        let meta = load_properties::<Product>().unwrap();
        let row = raw(&[
            ("id", Some("7")),
            ("name", Some("Kettle")),
            ("price", Some("19.5")),
            ("category_id", Some("3")),
            ("category_name", Some("Kitchen")),
        ]);

        let product: Product = hydrate_row(&meta, &row, &[]).unwrap();
        assert_eq!(product.id, Some(7));
        assert_eq!(product.name.as_str(), "Kettle");
        assert_eq!(product.price, 19.5);
        assert_eq!(product.category_id.map(|fk| fk.id()), Some(3));
        // Not requested, so left absent even though the row carries it.
        assert_eq!(product.category_name, None);
    }

    #[test]
    fn test_hydrate_fetched_remote_column() {
        let meta = load_properties::<Product>().unwrap();
        let row = raw(&[
            ("id", Some("7")),
            ("name", Some("Kettle")),
            ("price", Some("19.5")),
            ("category_id", None),
            ("category_name", Some("Kitchen")),
        ]);

        let product: Product = hydrate_row(&meta, &row, &[ProductField::CategoryName]).unwrap();
        assert_eq!(product.category_name.as_deref(), Some("Kitchen"));
        assert_eq!(product.category_id, None);
    }

    #[test]
    fn test_hydrate_nested_entity() {
        let meta = load_properties::<Product>().unwrap();
        let row = raw(&[
            ("id", Some("1")),
            ("name", Some("Kettle")),
            ("price", Some("10")),
            (
                "category",
                Some(r#"{"id": 3, "name": "Kitchen", "visible": "t"}"#),
            ),
        ]);

        let product: Product = hydrate_row(&meta, &row, &[ProductField::Category]).unwrap();
        let category = product.category.unwrap();
        assert_eq!(category.id, Some(3));
        assert_eq!(category.name, "Kitchen");
        assert!(category.visible);
    }

    #[test]
    fn test_hydrate_nested_list() {
        let categories: Vec<Category> = Vec::from_column(ColumnValue::Text(
            r#"[{"id": 1, "name": "A", "visible": true}, null, {"id": 2, "name": "B", "visible": "no"}]"#
                .into(),
        ))
        .unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].name, "B");
        assert!(!categories[1].visible);
    }

    #[test]
    fn test_empty_nested_payload_is_absent() {
        let meta = load_properties::<Product>().unwrap();
        let row = raw(&[
            ("id", Some("1")),
            ("name", Some("Kettle")),
            ("price", Some("10")),
            ("category", Some("[null]")),
        ]);
        let product: Product = hydrate_row(&meta, &row, &[ProductField::Category]).unwrap();
        assert!(product.category.is_none());
    }

    #[test]
    fn test_nested_one_rejects_many() {
        let value = ColumnValue::Records(
            decode_nested(r#"[{"id": 1, "name": "A", "visible": true}, {"id": 2, "name": "B", "visible": true}]"#)
                .unwrap(),
        );
        assert_matches!(hydrate_nested_one::<Category>(value), Err(Error::Entity(_)));
    }

    #[test]
    fn test_missing_required_field() {
        let meta = load_properties::<Product>().unwrap();
        let row = raw(&[("id", Some("1")), ("price", Some("10"))]);
        let err = hydrate_row::<Product>(&meta, &row, &[]).unwrap_err();
        assert_matches!(err, Error::Entity(EntityError { entity: "Product", ref filter, .. }) if filter.as_deref() == Some("name"));
    }

    #[test]
    fn test_invalid_value_reports_field() {
        let meta = load_properties::<Product>().unwrap();
        let row = raw(&[
            ("id", Some("1")),
            ("name", Some("Kettle")),
            ("price", Some("cheap")),
        ]);
        let err = hydrate_row::<Product>(&meta, &row, &[]).unwrap_err();
        assert_matches!(err, Error::Entity(EntityError { ref filter, .. }) if filter.as_deref() == Some("price"));
    }

    #[test]
    fn test_lenient_bool_column() {
        assert!(bool::from_column(ColumnValue::Text("YES".into())).unwrap());
        assert!(!bool::from_column(ColumnValue::Text("0".into())).unwrap());
        assert!(bool::from_column(ColumnValue::Text("maybe".into())).is_err());
    }

    #[test]
    fn test_dehydrate() {
        let name = BoundedString::<100>::new("Kettle").unwrap();
        assert_eq!(dehydrate(&name), SqlValue::Text("Kettle".into()));
        assert_eq!(dehydrate_optional::<i64>(&None), SqlValue::Null);
        assert_eq!(dehydrate(&ForeignKey::<Category>::new(4)), SqlValue::Int(4));
        assert_eq!(Some(5i32).id_value(), Some(5));
    }
}
