//! Statement execution seam
//!
//! Repositories talk to the database only through [`SqlExecutor`]. The sqlx
//! implementation binds statement parameters and flattens every row into a
//! [`RawRow`] of column text.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgConnection, Postgres, Row, TypeInfo};

use crate::error::{Result, SqlError};
use crate::orm::builder::Statement;
use crate::orm::hydrate::RawRow;

/// Executes built statements against one connection.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Run a query and return every row.
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<RawRow>>;

    /// Run a query and return the first row, if any.
    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<RawRow>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;
}

fn prepare(statement: &Statement) -> Result<Query<'_, Postgres, PgArguments>> {
    if statement.sql.trim().is_empty() {
        return Err(SqlError::EmptySql.into());
    }

    tracing::debug!(
        sql = %statement.sql,
        params = statement.params.len(),
        "Executing statement"
    );

    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = param.bind_to_query(query);
    }
    Ok(query)
}

/// Flatten a driver row into column text.
fn decode_row(row: &PgRow) -> Result<RawRow> {
    let mut raw = RawRow::with_capacity(row.columns().len());

    for column in row.columns() {
        let index = column.ordinal();
        let text = match column.type_info().name() {
            "BOOL" => row
                .try_get::<Option<bool>, _>(index)?
                .map(|v| v.to_string()),
            "INT2" => row.try_get::<Option<i16>, _>(index)?.map(|v| v.to_string()),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(|v| v.to_string()),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(|v| v.to_string()),
            "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(|v| v.to_string()),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(|v| v.to_string()),
            "NUMERIC" => row
                .try_get::<Option<Decimal>, _>(index)?
                .map(|v| v.to_string()),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(index)?
                .map(|v| v.to_string()),
            _ => row.try_get::<Option<String>, _>(index)?,
        };
        raw.insert(column.name().to_string(), text);
    }

    Ok(raw)
}

#[async_trait]
impl SqlExecutor for PgConnection {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<RawRow>> {
        let rows = prepare(statement)?.fetch_all(&mut *self).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<RawRow>> {
        let row = prepare(statement)?.fetch_optional(&mut *self).await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let done = prepare(statement)?.execute(&mut *self).await?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use assert_matches::assert_matches;

    #[test]
    fn test_prepare_rejects_empty_sql() {
        let statement = Statement::new("  ");
        assert_matches!(
            prepare(&statement).err(),
            Some(Error::Sql(SqlError::EmptySql))
        );
    }

    #[test]
    fn test_prepare_accepts_sql() {
        let statement = Statement::new("SELECT 1");
        assert!(prepare(&statement).is_ok());
    }
}
