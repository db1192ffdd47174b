//! Entity metadata: table names, property-to-column mappings, field kinds.
//!
//! The compiler only reads metadata through [`MetadataProvider`]. [`Registry`]
//! is the in-memory provider, filled programmatically or from a schema file.
//!
//! # Example
//! ```
//! use criteria_sql::metadata::{MetadataProvider, Registry};
//!
//! let toml = r#"
//! [[entity]]
//! name = "User"
//! table = "t_user"
//!
//! [[entity.field]]
//! name = "userName"
//! type = "text"
//! "#;
//!
//! let registry = Registry::from_toml(toml).unwrap();
//! let user = registry.resolve("User").unwrap();
//! assert_eq!(user.column_for("userName"), Some("user_name"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CriteriaError, CriteriaResult};

/// Declared scalar type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    #[serde(alias = "integer", alias = "i32")]
    Int,
    #[serde(alias = "bigint", alias = "i64")]
    Long,
    #[serde(alias = "smallint", alias = "i16")]
    Short,
    #[serde(alias = "tinyint", alias = "i8")]
    Byte,
    #[serde(alias = "real", alias = "f32")]
    Float,
    #[serde(alias = "f64")]
    Double,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "string", alias = "varchar")]
    Text,
    #[serde(alias = "date", alias = "datetime")]
    Timestamp,
    #[serde(alias = "numeric")]
    Decimal,
    #[default]
    Other,
}

/// Metadata for one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub column: String,
    pub kind: ScalarKind,
    /// Boxed / optional field: zero is a real value, not "unset".
    pub nullable: bool,
}

impl FieldMeta {
    pub fn new(column: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            column: column.into(),
            kind,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Table and column layout of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    pub name: String,
    pub table: String,
    fields: BTreeMap<String, FieldMeta>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a property whose column is the snake_case form of its name.
    pub fn field(self, property: &str, kind: ScalarKind) -> Self {
        let column = to_snake_case(property);
        self.with_field(property, FieldMeta::new(column, kind))
    }

    /// Add a property mapped to an explicit column.
    pub fn field_as(self, property: &str, column: &str, kind: ScalarKind) -> Self {
        self.with_field(property, FieldMeta::new(column, kind))
    }

    pub fn with_field(mut self, property: impl Into<String>, meta: FieldMeta) -> Self {
        self.fields.insert(property.into(), meta);
        self
    }

    pub fn get(&self, property: &str) -> Option<&FieldMeta> {
        self.fields.get(property)
    }

    pub fn column_for(&self, property: &str) -> Option<&str> {
        self.fields.get(property).map(|f| f.column.as_str())
    }

    pub fn kind_for(&self, property: &str) -> Option<ScalarKind> {
        self.fields.get(property).map(|f| f.kind)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldMeta)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Source of entity metadata for the builder and compiler.
pub trait MetadataProvider {
    /// Resolve an entity by name. Unknown entities are an error.
    fn resolve(&self, entity: &str) -> CriteriaResult<Arc<EntityMetadata>>;
}

/// In-memory metadata provider.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, meta: EntityMetadata) -> &mut Self {
        self.entities.insert(meta.name.clone(), Arc::new(meta));
        self
    }

    pub fn with(mut self, meta: EntityMetadata) -> Self {
        self.register(meta);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Registered entities sorted by name.
    pub fn entities(&self) -> Vec<Arc<EntityMetadata>> {
        let mut list: Vec<_> = self.entities.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Load a schema document from TOML.
    pub fn from_toml(input: &str) -> CriteriaResult<Self> {
        let doc: SchemaDoc =
            toml::from_str(input).map_err(|e| CriteriaError::Schema(e.to_string()))?;
        Ok(doc.into_registry())
    }

    /// Load a schema document from JSON.
    pub fn from_json(input: &str) -> CriteriaResult<Self> {
        let doc: SchemaDoc =
            serde_json::from_str(input).map_err(|e| CriteriaError::Schema(e.to_string()))?;
        Ok(doc.into_registry())
    }

    /// Load a schema file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> CriteriaResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&input),
            _ => Self::from_toml(&input),
        }
    }
}

impl MetadataProvider for Registry {
    fn resolve(&self, entity: &str) -> CriteriaResult<Arc<EntityMetadata>> {
        if let Some(meta) = self.entities.get(entity) {
            return Ok(Arc::clone(meta));
        }
        // `order.id` in hand-written scripts refers to entity `Order`
        self.entities
            .get(&first_upper(entity))
            .cloned()
            .ok_or_else(|| CriteriaError::UnknownEntity(entity.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    #[serde(default, rename = "entity", alias = "entities")]
    entities: Vec<EntityDef>,
}

#[derive(Debug, Deserialize)]
struct EntityDef {
    name: String,
    table: Option<String>,
    #[serde(default, rename = "field", alias = "fields")]
    fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize)]
struct FieldDef {
    name: String,
    column: Option<String>,
    #[serde(default, rename = "type", alias = "typ")]
    kind: ScalarKind,
    #[serde(default)]
    nullable: bool,
}

impl SchemaDoc {
    fn into_registry(self) -> Registry {
        let mut registry = Registry::new();
        for def in self.entities {
            let table = def.table.unwrap_or_else(|| to_snake_case(&def.name));
            let mut meta = EntityMetadata::new(def.name, table);
            for f in def.fields {
                let column = f.column.unwrap_or_else(|| to_snake_case(&f.name));
                let mut field = FieldMeta::new(column, f.kind);
                field.nullable = f.nullable;
                meta = meta.with_field(f.name, field);
            }
            registry.register(meta);
        }
        registry
    }
}

/// `customerId` -> `customer_id`, `OrderItem` -> `order_item`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn first_upper(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
