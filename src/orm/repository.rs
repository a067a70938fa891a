//! Generic repository over one entity type
//!
//! A repository borrows one executor (a checked-out connection or a
//! caller-owned transaction) for its whole life, so it serves exactly one
//! logical request at a time.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! let mut conn = db.acquire().await?;
//! let mut products = Repository::<Product, _>::new(&mut *conn)?;
//!
//! // Remote columns are fetched only on request
//! let cheap = products
//!     .get_list(
//!         Fetch::new()
//!             .filter("price < 10")
//!             .order_by("name")
//!             .add_column(ProductField::CategoryName),
//!     )
//!     .await?;
//!
//! let id = products.insert(&Product::new("Kettle", 19.5)).await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use super::builder::{self, Alias, Statement};
use super::hydrate::{RawRow, hydrate_row};
use super::metadata::{EntityMetadata, PropertyMetadata, load_properties};
use super::traits::{Entity, EntityField, OrderDirection, SqlValue};
use crate::db::SqlExecutor;
use crate::error::{EntityError, Result, SqlError};

/// Alias of the single column returned by aggregate queries.
const AGGREGATE_ALIAS: &str = "value";

/// Read options shared by the fetch operations.
#[derive(Debug, Clone)]
pub struct Fetch<F> {
    filter: Option<String>,
    order_by: Option<String>,
    group_by: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    add_columns: Vec<F>,
}

impl<F> Default for Fetch<F> {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: None,
            group_by: None,
            limit: None,
            offset: None,
            add_columns: Vec::new(),
        }
    }
}

impl<F: EntityField> Fetch<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// WHERE fragment, written with logical tokens.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Fetch a remote property that is skipped by default.
    pub fn add_column(mut self, field: F) -> Self {
        if !self.add_columns.contains(&field) {
            self.add_columns.push(field);
        }
        self
    }

    pub fn add_columns(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        for field in fields {
            self = self.add_column(field);
        }
        self
    }
}

/// Paging, sorting and filtering parameters produced by a data grid.
///
/// `order` and `condition` are keyed by logical column name and keep the
/// order they were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GridParameters {
    #[serde(default, deserialize_with = "ordered_map")]
    pub order: Vec<(String, OrderDirection)>,
    #[serde(default, deserialize_with = "ordered_map")]
    pub condition: Vec<(String, String)>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub from: Option<i64>,
}

fn ordered_map<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map keyed by column name")
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, V>()? {
                pairs.push(entry);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairVisitor(PhantomData))
}

/// CRUD and query engine bound to one entity type and one executor.
pub struct Repository<'c, E: Entity, X: SqlExecutor + ?Sized> {
    executor: &'c mut X,
    metadata: Arc<EntityMetadata<E::Field>>,
}

impl<'c, E: Entity, X: SqlExecutor + ?Sized> Repository<'c, E, X> {
    /// Bind a repository to `executor`. Fails when `E`'s declaration is broken.
    pub fn new(executor: &'c mut X) -> Result<Self> {
        Ok(Self {
            executor,
            metadata: load_properties::<E>()?,
        })
    }

    pub fn metadata(&self) -> &EntityMetadata<E::Field> {
        &self.metadata
    }

    // ========================================================================
    // Statement assembly
    // ========================================================================

    /// Whether `property` is part of the projection.
    fn is_fetched(property: &PropertyMetadata<E::Field>, add_columns: &[E::Field]) -> bool {
        !property.is_remote || add_columns.contains(&property.field)
    }

    fn fetched_properties<'m>(
        &'m self,
        add_columns: &'m [E::Field],
    ) -> impl Iterator<Item = &'m PropertyMetadata<E::Field>> + 'm {
        self.metadata
            .properties()
            .iter()
            .filter(move |p| Self::is_fetched(p, add_columns))
    }

    /// Every column is read as text, aliased by its logical name.
    fn projection(&self, add_columns: &[E::Field]) -> Vec<String> {
        self.fetched_properties(add_columns)
            .map(|p| format!("CAST({} AS text) AS \"{}\"", p.physical_column, p.name))
            .collect()
    }

    /// One LEFT JOIN per distinct join among the given remote properties.
    fn joins<'m, I>(&'m self, fields: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'m E::Field>,
    {
        let mut joins: Vec<String> = Vec::new();
        for field in fields {
            let Some(property) = self.metadata.property(*field) else {
                continue;
            };
            if let (Some(source), Some(condition)) =
                (property.join_source, property.join_condition.as_deref())
            {
                let join = builder::left_join(source, condition, None);
                if !joins.contains(&join) {
                    joins.push(join);
                }
            }
        }
        joins
    }

    fn translate(&self, fragment: Option<&str>) -> Option<String> {
        fragment
            .filter(|f| !f.is_empty())
            .map(|f| self.metadata.translate(f))
    }

    fn select_statement(
        &self,
        fetch: &Fetch<E::Field>,
        extra_joins: &[E::Field],
    ) -> Result<Statement> {
        let filter = self.translate(fetch.filter.as_deref());
        let order_by = self.translate(fetch.order_by.as_deref());
        let group_by = self.translate(fetch.group_by.as_deref());

        let statement =
            builder::select(self.projection(&fetch.add_columns), self.metadata.source())
                .joins(self.joins(fetch.add_columns.iter().chain(extra_joins)))
                .filter(filter.as_deref())
                .group_by(group_by.as_deref())
                .order_by(order_by.as_deref())
                .limit(fetch.limit)
                .offset(fetch.offset)
                .build()?;
        Ok(statement)
    }

    fn aggregate_statement(
        &self,
        expression: &str,
        fetch: &Fetch<E::Field>,
        extra_joins: &[E::Field],
    ) -> Result<Statement> {
        let expression = self.metadata.translate(expression);
        let filter = self.translate(fetch.filter.as_deref());
        let group_by = self.translate(fetch.group_by.as_deref());

        let statement = builder::select(
            [format!("{expression} AS \"{AGGREGATE_ALIAS}\"")],
            self.metadata.source(),
        )
        .joins(self.joins(fetch.add_columns.iter().chain(extra_joins)))
        .filter(filter.as_deref())
        .group_by(group_by.as_deref())
        .build()?;
        Ok(statement)
    }

    fn hydrate(&self, row: &RawRow, add_columns: &[E::Field]) -> Result<E> {
        hydrate_row::<E>(&self.metadata, row, add_columns)
    }

    /// Local, non-key columns with their dehydrated values.
    fn dehydrate(&self, entity: &E) -> Vec<(String, SqlValue)> {
        self.metadata
            .properties()
            .iter()
            .filter(|p| !p.is_primary_key && !p.is_remote)
            .map(|p| (p.physical_column.clone(), entity.field_value(p.field)))
            .collect()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// First matching entity, if any. Limits to one row unless told otherwise.
    pub async fn get_one(&mut self, fetch: Fetch<E::Field>) -> Result<Option<E>> {
        let fetch = Fetch {
            limit: fetch.limit.or(Some(1)),
            ..fetch
        };
        let statement = self.select_statement(&fetch, &[])?;
        match self.executor.fetch_optional(&statement).await? {
            Some(row) => self.hydrate(&row, &fetch.add_columns).map(Some),
            None => Ok(None),
        }
    }

    pub async fn get_one_by_id(&mut self, id: i64, add_columns: &[E::Field]) -> Result<Option<E>> {
        self.get_one(
            Fetch::new()
                .filter(builder::pk_is(id))
                .add_columns(add_columns.iter().copied()),
        )
        .await
    }

    pub async fn get_list(&mut self, fetch: Fetch<E::Field>) -> Result<Vec<E>> {
        self.list_with(&fetch, &[]).await
    }

    async fn list_with(
        &mut self,
        fetch: &Fetch<E::Field>,
        extra_joins: &[E::Field],
    ) -> Result<Vec<E>> {
        let statement = self.select_statement(fetch, extra_joins)?;
        let rows = self.executor.fetch_all(&statement).await?;
        tracing::debug!(entity = E::NAME, rows = rows.len(), "Fetched entity list");
        rows.iter()
            .map(|row| self.hydrate(row, &fetch.add_columns))
            .collect()
    }

    /// One grid page plus the number of rows matching the same filter.
    ///
    /// Only `filter`, `group_by` and `add_columns` are taken from `fetch`;
    /// ordering and paging come from `parameters`.
    pub async fn get_list_by_parameters(
        &mut self,
        parameters: &GridParameters,
        fetch: Fetch<E::Field>,
    ) -> Result<(Vec<E>, i64)> {
        // Terms name columns by logical token; the select translates them once.
        let mut referenced = Vec::new();

        let mut order = Vec::with_capacity(parameters.order.len());
        for (key, direction) in &parameters.order {
            let property = self.grid_property(key)?;
            referenced.push(property.field);
            order.push(builder::order(property.name, *direction));
        }

        let mut conditions = Vec::with_capacity(parameters.condition.len());
        for (key, value) in &parameters.condition {
            let property = self.grid_property(key)?;
            referenced.push(property.field);
            conditions.push(builder::unaccent_ilike(property.name, value));
        }

        let filter = match (
            fetch.filter.as_deref().filter(|f| !f.is_empty()),
            conditions.is_empty(),
        ) {
            (None, true) => None,
            (Some(filter), true) => Some(filter.to_string()),
            (None, false) => Some(builder::or(&conditions)),
            (Some(filter), false) => Some(builder::and([
                builder::bracket(filter),
                builder::or(&conditions),
            ])),
        };

        let page = Fetch {
            filter,
            order_by: (!order.is_empty()).then(|| builder::order_by(&order)),
            group_by: fetch.group_by,
            limit: parameters.count,
            offset: parameters.from,
            add_columns: fetch.add_columns,
        };

        let data = self.list_with(&page, &referenced).await?;
        let count = self.count_with(&page, &referenced).await?;

        Ok((data, count))
    }

    fn grid_property(&self, key: &str) -> Result<&PropertyMetadata<E::Field>> {
        E::Field::from_name(key)
            .and_then(|field| self.metadata.property(field))
            .ok_or_else(|| {
                EntityError::for_field(E::NAME, key, format!("unknown column `{key}`")).into()
            })
    }

    /// Single aggregate value as text; `"0"` when the query yields nothing.
    pub async fn get_aggregate(
        &mut self,
        expression: &str,
        fetch: Fetch<E::Field>,
    ) -> Result<String> {
        self.aggregate_with(expression, &fetch, &[]).await
    }

    async fn aggregate_with(
        &mut self,
        expression: &str,
        fetch: &Fetch<E::Field>,
        extra_joins: &[E::Field],
    ) -> Result<String> {
        let statement = self.aggregate_statement(expression, fetch, extra_joins)?;
        self.fetch_aggregate(&statement).await
    }

    async fn fetch_aggregate(&mut self, statement: &Statement) -> Result<String> {
        let row = self.executor.fetch_optional(statement).await?;
        Ok(row
            .and_then(|mut row| row.remove(AGGREGATE_ALIAS).flatten())
            .unwrap_or_else(|| "0".to_string()))
    }

    /// Rows selected by `fetch`. A grouped fetch selects one row per group,
    /// so the grouped query is counted as a whole.
    async fn count_with(
        &mut self,
        fetch: &Fetch<E::Field>,
        extra_joins: &[E::Field],
    ) -> Result<i64> {
        let count = builder::count("*", Alias::Omit);
        let mut statement = self.aggregate_statement(&count, fetch, extra_joins)?;
        if fetch.group_by.as_deref().is_some_and(|g| !g.is_empty()) {
            statement.sql = format!(
                "SELECT {count} AS \"{AGGREGATE_ALIAS}\" FROM ({}) t",
                statement.sql
            );
        }
        let value = self.fetch_aggregate(&statement).await?;
        parse_aggregate(E::NAME, &value)
    }

    pub async fn get_count(&mut self, fetch: Fetch<E::Field>) -> Result<i64> {
        self.count_with(&fetch, &[]).await
    }

    pub async fn get_sum(&mut self, field: E::Field, fetch: Fetch<E::Field>) -> Result<Decimal> {
        let column = self
            .metadata
            .property(field)
            .map(|p| p.physical_column.clone())
            .ok_or_else(|| EntityError::for_field(E::NAME, field.name(), "unknown column"))?;
        let value = self
            .get_aggregate(&builder::sum(&column, Alias::Omit), fetch)
            .await?;
        parse_aggregate(E::NAME, &value)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert `entity`; returns the new id when the entity declares one.
    pub async fn insert(&mut self, entity: &E) -> Result<Option<i64>> {
        let returning: &[&str] = if E::has_id() { &["id"] } else { &[] };
        let statement = builder::insert(self.metadata.source(), self.dehydrate(entity), returning)?;

        if returning.is_empty() {
            self.executor.execute(&statement).await?;
            return Ok(None);
        }

        let id = self
            .executor
            .fetch_optional(&statement)
            .await?
            .and_then(|mut row| row.remove("id").flatten())
            .map(|id| parse_aggregate::<i64>(E::NAME, &id))
            .transpose()?;

        tracing::debug!(entity = E::NAME, id = ?id, "Inserted entity");
        Ok(id)
    }

    /// Update every row matching `filter`; `true` when any row changed.
    pub async fn update(&mut self, entity: &E, filter: &str) -> Result<bool> {
        let filter = self.metadata.translate(filter);
        let statement = builder::update(self.metadata.source(), self.dehydrate(entity), &filter)?;
        Ok(self.executor.execute(&statement).await? > 0)
    }

    pub async fn update_by_id(&mut self, entity: &E, id: i64) -> Result<bool> {
        self.update(entity, &builder::pk_is(id)).await
    }

    /// Update the row identified by the entity's own id.
    pub async fn update_entity(&mut self, entity: &E) -> Result<bool> {
        let id = entity.id().ok_or(SqlError::MissingId { entity: E::NAME })?;
        self.update_by_id(entity, id).await
    }

    pub async fn delete_by_id(&mut self, id: i64) -> Result<bool> {
        self.delete(&builder::pk_is(id)).await
    }

    /// Delete every row matching `filter`; `true` when any row was removed.
    pub async fn delete(&mut self, filter: &str) -> Result<bool> {
        let filter = self.metadata.translate(filter);
        let statement = builder::delete(self.metadata.source(), &filter);
        Ok(self.executor.execute(&statement).await? > 0)
    }

    pub async fn delete_entity(&mut self, entity: &E) -> Result<bool> {
        let id = entity.id().ok_or(SqlError::MissingId { entity: E::NAME })?;
        self.delete_by_id(id).await
    }

    /// Dehydrated column map of `entity`, keyed by physical column.
    pub fn to_columns(&self, entity: &E) -> HashMap<String, SqlValue> {
        self.dehydrate(entity).into_iter().collect()
    }

    pub fn to_json(&self, entity: &E) -> Result<String>
    where
        E: Serialize,
    {
        Ok(serde_json::to_string(entity)?)
    }
}

fn parse_aggregate<T: std::str::FromStr>(entity: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        EntityError::new(entity, format!("unexpected aggregate value `{value}`")).into()
    })
}
