//! Procedural macros for QuickFeather
//!
//! - `#[derive(Entity)]` - Generate the column registry, field enumeration and
//!   hydration code for an entity struct

use proc_macro::TokenStream;

mod entity;

/// Map a struct with named fields onto a table or view.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Entity)]
/// #[entity(source = "shop.products")]
/// pub struct Product {
///     #[column(primary_key)]
///     pub id: Option<i64>,
///     pub name: BoundedString<100>,
///     #[column(name = "unit_price")]
///     pub price: f64,
///     pub category_id: Option<ForeignKey<Category>>,
///     #[column(table = "shop.categories", name = "categories.name", join = "categories.id = category_id")]
///     pub category_name: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[entity(source = "...")]` - primary table or view (required)
/// - `#[column(primary_key)]` - marks the primary key
/// - `#[column(name = "...")]` - physical column or expression, defaults to the field name
/// - `#[column(table = "...", join = "...")]` - the value lives in another table,
///   reached through `join` (written with logical field names). Such fields must be `Option`.
///
/// # Generated Code
///
/// For `Product`:
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// pub enum ProductField { Id, Name, Price, CategoryId, CategoryName }
///
/// impl EntityField for ProductField { /* name() / from_name() */ }
/// impl Entity for Product { /* NAME, SOURCE, columns(), from_row(), field_value(), id() */ }
/// impl FieldType for Product { /* nested hydration for remote entity columns */ }
/// ```
#[proc_macro_derive(Entity, attributes(entity, column))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity(input.into()).into()
}
