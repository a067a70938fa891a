//! QuickFeather - entity-to-relational mapping engine
//!
//! Maps annotated Rust structs onto PostgreSQL tables and views. Entities
//! declare their columns with `#[derive(Entity)]`; a [`Repository`] then
//! builds and runs the SQL to read and write them, including columns that
//! live in joined tables and whole nested entities.
//!
//! Value types in [`types`] validate single column values coming from
//! request input and render them for display, the wire and SQL.

extern crate self as quickfeather;

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod orm;
pub mod types;

pub use config::{Config, DatabaseConfig, LogFormat, LoggingConfig};
pub use db::{Database, SqlExecutor};
pub use error::{EntityError, Error, MetadataError, Result, SqlError, ValueError};
pub use orm::{
    Entity, EntityField, EntityManager, Fetch, FieldType, ForeignKey, GridParameters,
    OrderDirection, Repository, SqlValue, Statement,
};
pub use quickfeather_macros::Entity;
pub use types::{Filters, RequestParams, ValueType};
