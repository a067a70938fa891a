//! Entities shared by unit tests.

use async_trait::async_trait;
use serde::Serialize;

use crate::db::SqlExecutor;
use crate::error::Result;
use crate::orm::builder::Statement;
use crate::orm::hydrate::{ForeignKey, RawRow};
use crate::types::BoundedString;
use quickfeather_macros::Entity;

#[derive(Debug, Clone, PartialEq, Serialize, Entity)]
#[entity(source = "shop.categories")]
pub struct Category {
    #[column(primary_key)]
    pub id: Option<i64>,
    pub name: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Entity)]
#[entity(source = "shop.products")]
pub struct Product {
    #[column(primary_key)]
    pub id: Option<i64>,
    pub name: BoundedString<100>,
    pub price: f64,
    pub category_id: Option<ForeignKey<Category>>,
    #[column(
        table = "shop.categories",
        name = "name",
        join = "categories.id = category_id"
    )]
    pub category_name: Option<String>,
    #[column(
        table = "shop.categories",
        name = "row_to_json(categories)",
        join = "categories.id = category_id"
    )]
    pub category: Option<Category>,
}

impl Product {
    pub fn new(name: &str, price: f64) -> Self {
        Self {
            id: None,
            name: BoundedString::new(name).unwrap(),
            price,
            category_id: None,
            category_name: None,
            category: None,
        }
    }
}

/// Build a raw row from literal pairs.
pub fn row(pairs: &[(&str, Option<&str>)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
        .collect()
}

/// Executor that records statements and replays canned rows.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub statements: Vec<Statement>,
    rows: Vec<RawRow>,
    affected: u64,
}

impl RecordingExecutor {
    pub fn with_rows(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn affecting(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<RawRow>> {
        self.statements.push(statement.clone());
        Ok(self.rows.clone())
    }

    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<RawRow>> {
        self.statements.push(statement.clone());
        Ok(self.rows.first().cloned())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        self.statements.push(statement.clone());
        Ok(self.affected)
    }
}
