//! Error taxonomy for the mapping engine
//!
//! Every failure the core can raise is a value returned to the caller. Value
//! parsing fails with [`ValueError`], entity-level checks with [`EntityError`],
//! broken entity declarations with [`MetadataError`] and builder preconditions
//! with [`SqlError`]. [`Error`] wraps them together with driver failures.

use thiserror::Error;

/// Failure while parsing or validating a single value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// A required identifier is missing from the request parameter bag.
    #[error("{type_name}: {message}")]
    Identifier {
        type_name: &'static str,
        message: String,
    },

    /// A required value is absent after filtering.
    #[error("{type_name}: value is required")]
    Null { type_name: &'static str },

    /// A value failed structural validation.
    #[error("{type_name}: {message}")]
    Type {
        type_name: &'static str,
        message: String,
        max_length: Option<usize>,
    },
}

impl ValueError {
    pub fn identifier(type_name: &'static str, message: impl Into<String>) -> Self {
        Self::Identifier {
            type_name,
            message: message.into(),
        }
    }

    pub fn null(type_name: &'static str) -> Self {
        Self::Null { type_name }
    }

    pub fn invalid(type_name: &'static str, message: impl Into<String>) -> Self {
        Self::Type {
            type_name,
            message: message.into(),
            max_length: None,
        }
    }

    pub fn too_long(type_name: &'static str, max_length: usize) -> Self {
        Self::Type {
            type_name,
            message: format!("value is longer than {max_length} characters"),
            max_length: Some(max_length),
        }
    }

    /// Name of the value type that raised the error.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Identifier { type_name, .. }
            | Self::Null { type_name }
            | Self::Type { type_name, .. } => type_name,
        }
    }
}

/// Entity-level validation failure, tagged with the entity and the field involved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity}: {message}")]
pub struct EntityError {
    pub entity: &'static str,
    pub filter: Option<String>,
    pub message: String,
}

impl EntityError {
    pub fn new(entity: &'static str, message: impl Into<String>) -> Self {
        Self {
            entity,
            filter: None,
            message: message.into(),
        }
    }

    pub fn for_field(
        entity: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            filter: Some(field.into()),
            message: message.into(),
        }
    }
}

/// An entity declaration is missing column-definition data it needs to be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity}: {message}")]
pub struct MetadataError {
    pub entity: &'static str,
    pub message: String,
}

impl MetadataError {
    pub fn new(entity: &'static str, message: impl Into<String>) -> Self {
        Self {
            entity,
            message: message.into(),
        }
    }
}

/// A query builder precondition was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    #[error("List is empty")]
    EmptyList,

    #[error("Table {table} has empty field definition")]
    EmptyColumns { table: String },

    #[error("SQL is empty")]
    EmptySql,

    #[error("{entity} has no id")]
    MissingId { entity: &'static str },
}

/// Any failure surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Nested payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
