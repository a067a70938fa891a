//! Property metadata
//!
//! Derived once per entity type from its static column registry and cached
//! for the life of the process. The cached value is read-only, so repositories
//! for the same entity share it freely.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::traits::{Entity, EntityField, FieldKind};
use super::translate::ColumnTranslator;
use crate::error::MetadataError;

/// Computed descriptor of one entity property.
#[derive(Debug, Clone)]
pub struct PropertyMetadata<F> {
    pub field: F,
    /// Logical token
    pub name: &'static str,
    /// `schema.table.column` when local. A remote bare column is qualified
    /// with its joined table (`table.column`); remote expressions stay as given.
    pub physical_column: String,
    pub source_table: &'static str,
    pub is_remote: bool,
    pub join_source: Option<&'static str>,
    /// Join condition with logical tokens already translated
    pub join_condition: Option<String>,
    pub is_primary_key: bool,
    pub nullable: bool,
    pub kind: FieldKind,
    pub max_length: Option<usize>,
}

impl<F> PropertyMetadata<F> {
    /// Whether `qualified` (`table.column`) names this property's column.
    pub fn matches_qualified(&self, qualified: &str) -> bool {
        self.physical_column == qualified
            || self
                .physical_column
                .strip_suffix(qualified)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Ordered property list of one entity type.
#[derive(Debug)]
pub struct EntityMetadata<F> {
    entity: &'static str,
    source: &'static str,
    properties: Vec<PropertyMetadata<F>>,
    translator: ColumnTranslator,
}

impl<F: EntityField> EntityMetadata<F> {
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyMetadata<F>] {
        &self.properties
    }

    pub fn property(&self, field: F) -> Option<&PropertyMetadata<F>> {
        self.properties.iter().find(|p| p.field == field)
    }

    pub fn by_name(&self, name: &str) -> Option<&PropertyMetadata<F>> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn primary_key(&self) -> Option<&PropertyMetadata<F>> {
        self.properties.iter().find(|p| p.is_primary_key)
    }

    /// Rewrite logical tokens in a caller-supplied fragment.
    pub fn translate(&self, fragment: &str) -> String {
        self.translator.translate(fragment)
    }
}

type Registry = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Metadata for `E`, computed on first use and cached.
pub fn load_properties<E: Entity>() -> Result<Arc<EntityMetadata<E::Field>>, MetadataError> {
    let key = TypeId::of::<E>();

    if let Some(cached) = REGISTRY.read().get(&key).cloned() {
        if let Ok(metadata) = cached.downcast::<EntityMetadata<E::Field>>() {
            return Ok(metadata);
        }
    }

    let metadata = Arc::new(build::<E>()?);
    REGISTRY.write().insert(key, metadata.clone());
    tracing::debug!(
        entity = E::NAME,
        properties = metadata.properties.len(),
        "Entity metadata loaded"
    );
    Ok(metadata)
}

/// Last segment of a possibly schema-qualified table.
fn table_name(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}

fn is_bare_column(column: &str) -> bool {
    column
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn build<E: Entity>() -> Result<EntityMetadata<E::Field>, MetadataError> {
    let entity = E::NAME;
    let columns = E::columns();

    if E::SOURCE.is_empty() {
        return Err(MetadataError::new(entity, "entity has no source table"));
    }
    if columns.is_empty() {
        return Err(MetadataError::new(entity, "entity declares no columns"));
    }

    let mut seen = HashSet::new();
    let mut properties = Vec::with_capacity(columns.len());

    for def in columns {
        if def.table.is_empty() || def.column.is_empty() {
            return Err(MetadataError::new(
                entity,
                format!("field `{}` has no column definition", def.name),
            ));
        }
        if !seen.insert(def.name) {
            return Err(MetadataError::new(
                entity,
                format!("field `{}` is declared twice", def.name),
            ));
        }

        let is_remote = def.table != E::SOURCE;
        if is_remote && !def.nullable {
            return Err(MetadataError::new(
                entity,
                format!("remote field `{}` must be optional", def.name),
            ));
        }
        if is_remote && def.primary_key {
            return Err(MetadataError::new(
                entity,
                format!("primary key `{}` cannot be remote", def.name),
            ));
        }

        let physical_column = if !is_remote {
            format!("{}.{}", def.table, def.column)
        } else if is_bare_column(def.column) {
            format!("{}.{}", table_name(def.table), def.column)
        } else {
            def.column.to_string()
        };

        properties.push(PropertyMetadata {
            field: def.field,
            name: def.name,
            physical_column,
            source_table: def.table,
            is_remote,
            join_source: is_remote.then_some(def.table),
            join_condition: if is_remote {
                def.join.map(str::to_string)
            } else {
                None
            },
            is_primary_key: def.primary_key,
            nullable: def.nullable,
            kind: def.kind,
            max_length: def.max_length,
        });
    }

    if properties.iter().filter(|p| p.is_primary_key).count() > 1 {
        return Err(MetadataError::new(entity, "more than one primary key"));
    }

    let translator = ColumnTranslator::new(
        properties
            .iter()
            .map(|p| (p.name, p.physical_column.clone())),
    )
    .map_err(|e| MetadataError::new(entity, format!("cannot build column translator: {e}")))?;

    // Join conditions may reference siblings declared later, so translate
    // only once every physical name is known.
    for property in &mut properties {
        if let Some(condition) = property.join_condition.take() {
            property.join_condition = Some(translator.translate(&condition));
        }
    }

    Ok(EntityMetadata {
        entity,
        source: E::SOURCE,
        properties,
        translator,
    })
}
