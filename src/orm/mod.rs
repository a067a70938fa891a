//! Entity-to-relational mapping layer
//!
//! Provides traits and utilities for macro-generated entities. The
//! `quickfeather-macros` crate implements these traits from annotated Rust
//! structs, giving one source of truth for:
//! - Property metadata (logical name, physical column, remote/join info)
//! - The closed field enumeration used for `add_columns` and grid keys
//! - Row hydration and dehydration
//! - Nested entity decoding for remote columns
//!
//! # Declaring an entity
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Serialize, Entity)]
//! #[entity(source = "shop.products")]
//! pub struct Product {
//!     #[column(primary_key)]
//!     pub id: Option<i64>,
//!     pub name: BoundedString<100>,
//!     pub price: f64,
//!     pub category_id: Option<ForeignKey<Category>>,
//!     #[column(table = "shop.categories", name = "categories.name", join = "categories.id = category_id")]
//!     pub category_name: Option<String>,
//! }
//! ```
//!
//! Fragments passed to the repository (`filter`, `order_by`, `group_by`) are
//! written with logical names and rewritten to physical columns before they
//! run.

pub mod builder;
pub mod hydrate;
pub mod literal;
mod manager;
mod metadata;
mod repository;
mod traits;
pub mod translate;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::Statement;
pub use hydrate::{
    ColumnValue, ForeignKey, HydratedRow, IdValue, NestedRecord, RawRow, dehydrate,
    dehydrate_optional, hydrate_nested, hydrate_nested_one,
};
pub use manager::EntityManager;
pub use metadata::{EntityMetadata, PropertyMetadata, load_properties};
pub use repository::{Fetch, GridParameters, Repository};
pub use traits::*;
pub use translate::{ColumnTranslator, translate_column_name};
