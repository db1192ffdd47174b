//! Property-to-column resolution.
//!
//! Rendered SQL refers to logical names: entity names and property names.
//! After assembly every variant is rewritten to physical table and column
//! names, in one of two modes:
//!
//! - single entity: bare properties of the target entity become columns;
//! - multi entity (raw source script): every `Entity.property` reference is
//!   resolved through the provider and recorded in a [`NameMapper`].

use std::collections::HashMap;

use crate::error::CriteriaResult;
use crate::metadata::{EntityMetadata, MetadataProvider};
use crate::parser;

/// Words that are never treated as property names.
const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "LIKE", "BETWEEN", "ORDER", "BY", "ASC",
    "DESC", "AS", "COUNT", "GROUP", "JOIN", "INNER", "LEFT", "RIGHT", "OUTER", "ON", "LIMIT",
    "OFFSET", "NULL", "IS",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

/// Bidirectional `logical <-> physical` name table for one compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapper {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl NameMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, logical: impl Into<String>, physical: impl Into<String>) {
        let (logical, physical) = (logical.into(), physical.into());
        self.reverse.insert(physical.clone(), logical.clone());
        self.forward.insert(logical, physical);
    }

    /// `Order.customerId` -> `t_order.customer_id`
    pub fn physical(&self, logical: &str) -> Option<&str> {
        self.forward.get(logical).map(String::as_str)
    }

    /// `t_order.customer_id` -> `Order.customerId`
    pub fn logical(&self, physical: &str) -> Option<&str> {
        self.reverse.get(physical).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Name resolution for a query spanning several entities.
#[derive(Debug, Clone, Default)]
pub struct FetchMapping {
    mapper: NameMapper,
    /// entity name -> table name
    tables: HashMap<String, String>,
}

impl FetchMapping {
    /// Collect every `Entity.property` in `sql` and resolve it.
    ///
    /// Fails when a referenced entity is not registered. Properties without
    /// a declared column keep their own name.
    pub fn build(sql: &str, provider: &dyn MetadataProvider) -> CriteriaResult<Self> {
        let mut mapping = Self::default();
        let mut resolved: HashMap<&str, (String, std::sync::Arc<EntityMetadata>)> = HashMap::new();

        for (entity, property) in parser::qualified_refs(sql) {
            if !resolved.contains_key(entity) {
                let meta = provider.resolve(entity)?;
                mapping
                    .tables
                    .insert(entity.to_string(), meta.table.clone());
                resolved.insert(entity, (meta.table.clone(), meta));
            }
            let (table, meta) = &resolved[entity];
            let column = meta.column_for(property).unwrap_or(property);
            mapping.mapper.insert(
                format!("{}.{}", entity, property),
                format!("{}.{}", table, column),
            );
        }

        tracing::trace!(mapper = ?mapping.mapper, "fetch names resolved");
        Ok(mapping)
    }

    pub fn mapper(&self) -> &NameMapper {
        &self.mapper
    }

    pub fn into_mapper(self) -> NameMapper {
        self.mapper
    }

    /// Rewrite `Entity.property` to `table.column` and bare entity names to
    /// table names.
    pub fn rewrite(&self, sql: &str) -> String {
        parser::rewrite_paths(sql, |path| {
            if path.contains('.') {
                self.mapper.physical(path).map(str::to_string)
            } else {
                self.tables.get(path).cloned()
            }
        })
    }
}

/// Rewrite logical names of a single-entity query.
///
/// `property` -> `column`, `Entity.property` -> `table.column`,
/// `Entity` -> `table`. Anything else is left alone.
pub fn rewrite_single(sql: &str, meta: &EntityMetadata) -> String {
    parser::rewrite_paths(sql, |path| match path.split_once('.') {
        Some((entity, property)) if entity == meta.name => Some(format!(
            "{}.{}",
            meta.table,
            meta.column_for(property).unwrap_or(property)
        )),
        Some(_) => None,
        None if path == meta.name => Some(meta.table.clone()),
        None if is_reserved(path) => None,
        None => meta.column_for(path).map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CriteriaError;
    use crate::metadata::{Registry, ScalarKind};

    fn registry() -> Registry {
        Registry::new()
            .with(
                EntityMetadata::new("Order", "t_order")
                    .field("id", ScalarKind::Long)
                    .field("customerId", ScalarKind::Long),
            )
            .with(
                EntityMetadata::new("Customer", "t_customer")
                    .field("id", ScalarKind::Long)
                    .field_as("name", "full_name", ScalarKind::Text),
            )
    }

    #[test]
    fn test_name_mapper_both_ways() {
        let mut m = NameMapper::new();
        m.insert("Order.customerId", "t_order.customer_id");
        assert_eq!(m.physical("Order.customerId"), Some("t_order.customer_id"));
        assert_eq!(m.logical("t_order.customer_id"), Some("Order.customerId"));
        assert_eq!(m.physical("Order.id"), None);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_fetch_mapping_rewrites_refs_and_entities() {
        let sql = "SELECT Order.id, Customer.name FROM Order INNER JOIN Customer \
                   ON Order.customerId = Customer.id WHERE Customer.name LIKE ?";
        let mapping = FetchMapping::build(sql, &registry()).unwrap();
        assert_eq!(
            mapping.rewrite(sql),
            "SELECT t_order.id, t_customer.full_name FROM t_order INNER JOIN t_customer \
             ON t_order.customer_id = t_customer.id WHERE t_customer.full_name LIKE ?"
        );
        assert_eq!(
            mapping.mapper().logical("t_customer.full_name"),
            Some("Customer.name")
        );
    }

    #[test]
    fn test_fetch_mapping_keeps_undeclared_property() {
        let mapping = FetchMapping::build("SELECT Order.total FROM Order", &registry()).unwrap();
        assert_eq!(mapping.mapper().physical("Order.total"), Some("t_order.total"));
    }

    #[test]
    fn test_fetch_mapping_unknown_entity() {
        let err = FetchMapping::build("SELECT Invoice.id FROM Invoice", &registry()).unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownEntity(e) if e == "Invoice"));
    }

    #[test]
    fn test_rewrite_single() {
        let reg = registry();
        let customer = reg.resolve("Customer").unwrap();
        let sql = rewrite_single(
            "SELECT Customer.name, tc.name FROM t_customer WHERE name = 'name' ORDER BY id ASC",
            &customer,
        );
        assert_eq!(
            sql,
            "SELECT t_customer.full_name, tc.name FROM t_customer WHERE full_name = 'name' ORDER BY id ASC"
        );
    }

    #[test]
    fn test_rewrite_single_keeps_alias() {
        let reg = registry();
        let customer = reg.resolve("Customer").unwrap();
        assert_eq!(
            rewrite_single("SELECT Customer.name as name FROM t_customer", &customer),
            "SELECT t_customer.full_name as name FROM t_customer"
        );
    }
}
