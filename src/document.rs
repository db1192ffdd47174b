//! JSON query documents.
//!
//! A document describes one criteria as data, so it can be stored or sent
//! over the wire and compiled later:
//!
//! ```json
//! {
//!   "entity": "User",
//!   "filters": [
//!     { "op": "eq", "property": "status", "value": "ACTIVE" },
//!     { "op": "group", "filters": [
//!         { "op": "gt", "property": "age", "value": 18 },
//!         { "op": "like", "property": "name", "value": "ann", "conjunction": "or" }
//!     ]}
//!   ],
//!   "order_by": { "property": "createdAt", "direction": "desc" },
//!   "paging": { "page": 2, "rows": 20 }
//! }
//! ```
//!
//! A document with `fetch`, `select` or `source` builds a fetch-mode criteria.

use std::path::Path;

use serde::Deserialize;

use crate::ast::{Conjunction, Direction, Value};
use crate::builder::{Clause, CriteriaBuilder, Scope};
use crate::criteria::{Criteria, FetchRequest, Paging};
use crate::error::{CriteriaError, CriteriaResult};
use crate::metadata::MetadataProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryDocument {
    pub entity: String,
    /// Result keys as x-expressions, plus paging.
    #[serde(default)]
    pub fetch: Option<FetchRequest>,
    /// Trusted projections, `Entity.property [as alias]`.
    #[serde(default)]
    pub select: Vec<String>,
    /// Raw multi-table FROM source.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub order_by: Option<OrderByDoc>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderByDoc {
    pub property: String,
    #[serde(default)]
    pub direction: Direction,
}

/// One filter and the conjunction joining it to the previous sibling.
#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub conjunction: Conjunction,
    #[serde(flatten)]
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterKind {
    Eq { property: String, value: serde_json::Value },
    Lt { property: String, value: serde_json::Value },
    Lte { property: String, value: serde_json::Value },
    Gt { property: String, value: serde_json::Value },
    Gte { property: String, value: serde_json::Value },
    Not { property: String, value: serde_json::Value },
    Like { property: String, value: serde_json::Value },
    Between {
        property: String,
        min: serde_json::Value,
        max: serde_json::Value,
    },
    In {
        property: String,
        values: Vec<serde_json::Value>,
    },
    NotIn {
        property: String,
        values: Vec<serde_json::Value>,
    },
    Group { filters: Vec<Filter> },
}

impl QueryDocument {
    pub fn from_json(input: &str) -> CriteriaResult<Self> {
        serde_json::from_str(input).map_err(|e| CriteriaError::Document(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> CriteriaResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn is_fetch(&self) -> bool {
        self.fetch.is_some() || self.source.is_some() || !self.select.is_empty()
    }

    /// Replay the document through a [`CriteriaBuilder`].
    pub fn build(&self, provider: &dyn MetadataProvider) -> CriteriaResult<Criteria> {
        let mut builder = if self.is_fetch() {
            CriteriaBuilder::fetch(provider, &self.entity, self.fetch.as_ref())?
        } else {
            CriteriaBuilder::new(provider, &self.entity)?
        };

        for projection in &self.select {
            builder.select(projection)?;
        }
        if let Some(source) = &self.source {
            builder.source_script(source.as_str());
        }

        apply_filters(&mut builder, &self.filters)?;

        if let Some(property) = &self.group_by {
            builder.group_by(property)?;
        }
        if let Some(order) = &self.order_by {
            builder.order_by(&order.property, order.direction)?;
        }
        if let Some(paging) = self.paging {
            builder.paged(paging);
        }
        Ok(builder.build())
    }
}

fn apply_filters(scope: &mut dyn Scope, filters: &[Filter]) -> CriteriaResult<()> {
    for filter in filters {
        let conjunction = match filter.conjunction {
            c @ (Conjunction::And | Conjunction::Or) => c,
            other => {
                return Err(CriteriaError::Document(format!(
                    "'{}' is not a filter conjunction",
                    other.sql()
                )));
            }
        };
        apply(Clause::new(&mut *scope, conjunction), &filter.kind)?;
    }
    Ok(())
}

fn apply(clause: Clause<'_, dyn Scope + '_>, kind: &FilterKind) -> CriteriaResult<()> {
    match kind {
        FilterKind::Eq { property, value } => clause.eq(property, scalar(value)).map(drop),
        FilterKind::Lt { property, value } => clause.lt(property, scalar(value)).map(drop),
        FilterKind::Lte { property, value } => clause.lte(property, scalar(value)).map(drop),
        FilterKind::Gt { property, value } => clause.gt(property, scalar(value)).map(drop),
        FilterKind::Gte { property, value } => clause.gte(property, scalar(value)).map(drop),
        FilterKind::Not { property, value } => clause.not(property, scalar(value)).map(drop),
        FilterKind::Like { property, value } => clause.like(property, scalar(value)).map(drop),
        FilterKind::Between { property, min, max } => {
            clause.between(property, scalar(min), scalar(max)).map(drop)
        }
        FilterKind::In { property, values } => {
            clause.is_in(property, values.iter().map(scalar)).map(drop)
        }
        FilterKind::NotIn { property, values } => {
            clause.not_in(property, values.iter().map(scalar)).map(drop)
        }
        FilterKind::Group { filters } => {
            let mut group = clause.x();
            apply_filters(&mut group, filters)
        }
    }
}

fn scalar(value: &serde_json::Value) -> Value {
    Value::from(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeValue;
    use crate::metadata::{EntityMetadata, Registry, ScalarKind};
    use crate::transpiler::compile;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Registry::new()
            .with(
                EntityMetadata::new("User", "t_user")
                    .field("id", ScalarKind::Long)
                    .field("age", ScalarKind::Int)
                    .field("name", ScalarKind::Text)
                    .field("status", ScalarKind::Text),
            )
            .with(
                EntityMetadata::new("Order", "t_order")
                    .field("id", ScalarKind::Long)
                    .field("userId", ScalarKind::Long),
            )
    }

    #[test]
    fn test_document_with_group() {
        let doc = QueryDocument::from_json(
            r#"{
                "entity": "User",
                "filters": [
                    { "op": "eq", "property": "status", "value": "ACTIVE" },
                    { "op": "group", "filters": [
                        { "op": "gt", "property": "age", "value": 18 },
                        { "op": "like", "property": "name", "value": "ann", "conjunction": "or" }
                    ]}
                ],
                "order_by": { "property": "id", "direction": "desc" }
            }"#,
        )
        .unwrap();
        let criteria = doc.build(&registry()).unwrap();
        let sql = compile(&criteria, &registry()).unwrap();
        assert_eq!(
            sql.data,
            "SELECT * FROM t_user WHERE status = ? AND (age > ? OR name LIKE ?) ORDER BY id DESC"
        );
        assert_eq!(
            sql.binds,
            vec![Value::from("ACTIVE"), Value::Int(18), Value::from("%ann%")]
        );
    }

    #[test]
    fn test_absent_values_dropped() {
        let doc = QueryDocument::from_json(
            r#"{
                "entity": "User",
                "filters": [
                    { "op": "eq", "property": "name", "value": null },
                    { "op": "eq", "property": "age", "value": 0 },
                    { "op": "in", "property": "id", "values": [] },
                    { "op": "group", "filters": [] }
                ]
            }"#,
        )
        .unwrap();
        let criteria = doc.build(&registry()).unwrap();
        assert!(criteria.nodes().is_empty());
    }

    #[test]
    fn test_list_and_between() {
        let doc = QueryDocument::from_json(
            r#"{
                "entity": "User",
                "filters": [
                    { "op": "between", "property": "age", "min": 18, "max": 30 },
                    { "op": "not_in", "property": "status", "values": ["BANNED", "GONE"] }
                ],
                "group_by": "status"
            }"#,
        )
        .unwrap();
        let criteria = doc.build(&registry()).unwrap();
        assert_eq!(criteria.nodes().len(), 3);
        assert_eq!(
            criteria.nodes()[1].value,
            NodeValue::List(vec![Value::from("BANNED"), Value::from("GONE")])
        );
        assert!(criteria.group_by().is_some());
    }

    #[test]
    fn test_fetch_document() {
        let doc = QueryDocument::from_json(
            r#"{
                "entity": "User",
                "fetch": { "result_keys": ["User->id", "Order->id.as.oid"], "page": 2, "rows": 5 },
                "source": "User INNER JOIN Order ON Order.userId = User.id",
                "filters": [ { "op": "eq", "property": "Order->id", "value": 7 } ]
            }"#,
        )
        .unwrap();
        assert!(doc.is_fetch());
        let criteria = doc.build(&registry()).unwrap();
        assert_eq!(criteria.paging(), Some(Paging::new(2, 5)));
        let sql = compile(&criteria, &registry()).unwrap();
        assert_eq!(
            sql.data,
            "SELECT t_user.id, t_order.id AS oid FROM t_user INNER JOIN t_order \
             ON t_order.user_id = t_user.id WHERE t_order.id = ?"
        );
    }

    #[test]
    fn test_unknown_property_rejected() {
        let doc = QueryDocument::from_json(
            r#"{ "entity": "User", "filters": [ { "op": "eq", "property": "agee", "value": 1 } ] }"#,
        )
        .unwrap();
        let err = doc.build(&registry()).unwrap_err();
        assert!(matches!(err, CriteriaError::UnknownProperty { .. }));
    }

    #[test]
    fn test_group_by_is_not_a_filter_conjunction() {
        let doc = QueryDocument::from_json(
            r#"{ "entity": "User", "filters": [
                { "op": "eq", "property": "age", "value": 1, "conjunction": "group_by" }
            ] }"#,
        )
        .unwrap();
        let err = doc.build(&registry()).unwrap_err();
        assert!(matches!(err, CriteriaError::Document(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = QueryDocument::from_json("{ \"filters\": [] }").unwrap_err();
        assert!(matches!(err, CriteriaError::Document(_)));
    }
}
