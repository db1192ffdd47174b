//! The query-level container compiled into SQL.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::{Direction, PredicateNode};
use crate::metadata::EntityMetadata;

/// Placeholder substituted with the result-column list.
pub const PROJECTION_TAG: &str = "${PROJECTION}";

/// Page number (1-based) and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub page: u32,
    pub rows: u32,
}

impl Paging {
    pub fn new(page: u32, rows: u32) -> Self {
        Self { page, rows }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.rows)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.rows)
    }
}

/// Request-side description of a fetch: result keys as x-expressions
/// (`Order->id`, `Order->id.as.oid`) plus optional paging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub result_keys: Vec<String>,
    pub page: Option<u32>,
    pub rows: Option<u32>,
}

impl FetchRequest {
    /// Paging, when a page size was requested.
    pub fn paging(&self) -> Option<Paging> {
        self.rows.map(|rows| Paging::new(self.page.unwrap_or(1), rows))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub property: String,
    pub direction: Direction,
}

/// Target entity, predicate list, sort, paging and, in fetch mode, the
/// projection list and optional multi-table source.
///
/// Built by [`CriteriaBuilder`](crate::builder::CriteriaBuilder), consumed by
/// [`compile`](crate::transpiler::compile).
#[derive(Debug, Clone)]
pub struct Criteria {
    pub(crate) metadata: Arc<EntityMetadata>,
    pub(crate) nodes: Vec<PredicateNode>,
    pub(crate) order_by: Option<OrderBy>,
    pub(crate) paging: Option<Paging>,
    pub(crate) source: Option<String>,
    /// `Some` in fetch mode.
    pub(crate) projections: Option<Vec<String>>,
}

impl Criteria {
    pub fn new(metadata: Arc<EntityMetadata>) -> Self {
        Self {
            metadata,
            nodes: Vec::new(),
            order_by: None,
            paging: None,
            source: None,
            projections: None,
        }
    }

    /// Criteria in fetch mode: schema-less property checks and an explicit
    /// projection list.
    pub fn fetch(metadata: Arc<EntityMetadata>) -> Self {
        Self {
            projections: Some(Vec::new()),
            ..Self::new(metadata)
        }
    }

    pub fn entity(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn is_fetch(&self) -> bool {
        self.projections.is_some()
    }

    pub fn nodes(&self) -> &[PredicateNode] {
        &self.nodes
    }

    pub fn order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn paging(&self) -> Option<Paging> {
        self.paging
    }

    pub fn projections(&self) -> &[String] {
        self.projections.as_deref().unwrap_or_default()
    }

    /// Raw multi-table source, fetch mode only.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The group-by marker, if any.
    pub fn group_by(&self) -> Option<&PredicateNode> {
        self.nodes.iter().find(|n| n.is_group_by())
    }

    /// Append the FROM clause. Returns true when it is a raw multi-table script.
    pub fn source_script(&self, sql: &mut String) -> bool {
        sql.push_str(" FROM ");
        match &self.source {
            Some(script) => {
                sql.push_str(script);
                true
            }
            None => {
                sql.push_str(&self.metadata.table);
                false
            }
        }
    }

    /// Column list used in place of [`PROJECTION_TAG`] in the data query.
    pub fn default_projection(&self) -> String {
        match &self.projections {
            Some(list) if !list.is_empty() => list.join(", "),
            _ => "*".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Arc<EntityMetadata> {
        Arc::new(EntityMetadata::new("User", "t_user"))
    }

    #[test]
    fn test_paging_offset() {
        assert_eq!(Paging::new(1, 20).offset(), 0);
        assert_eq!(Paging::new(3, 20).offset(), 40);
        assert_eq!(Paging::new(0, 20).offset(), 0);
    }

    #[test]
    fn test_source_script() {
        let mut sql = String::from("SELECT *");
        assert!(!Criteria::new(user()).source_script(&mut sql));
        assert_eq!(sql, "SELECT * FROM t_user");

        let mut fetch = Criteria::fetch(user());
        fetch.source = Some("User INNER JOIN Order ON Order.userId = User.id".to_string());
        let mut sql = String::new();
        assert!(fetch.source_script(&mut sql));
        assert!(sql.starts_with(" FROM User INNER JOIN"));
    }

    #[test]
    fn test_default_projection() {
        let mut fetch = Criteria::fetch(user());
        assert_eq!(fetch.default_projection(), "*");
        fetch.projections = Some(vec!["User.id".into(), "User.name AS n".into()]);
        assert_eq!(fetch.default_projection(), "User.id, User.name AS n");
        assert!(fetch.is_fetch());
        assert!(!Criteria::new(user()).is_fetch());
    }
}
