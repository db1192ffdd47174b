//! SQL compiler for criteria.
//!
//! Renders a [`Criteria`] into three SQL variants plus the bind values for
//! their `?` placeholders:
//!
//! - `count`: a single-row count query;
//! - `data`: the query with the real result columns;
//! - `template`: the data query with [`PROJECTION_TAG`] left in place so a
//!   caller can substitute another column list later.

use crate::ast::{MinMax, NodeValue, PredicateNode, Value};
use crate::criteria::{Criteria, Paging, PROJECTION_TAG};
use crate::error::CriteriaResult;
use crate::mapper::{self, FetchMapping, NameMapper};
use crate::metadata::MetadataProvider;

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSql {
    pub count: String,
    pub data: String,
    pub template: String,
    /// Bind values in placeholder order. Shared by all three variants.
    pub binds: Vec<Value>,
    /// Names resolved for a multi-entity query.
    pub mapper: Option<NameMapper>,
}

impl CompiledSql {
    /// `[count, data, template]`.
    pub fn variants(&self) -> [&str; 3] {
        [&self.count, &self.data, &self.template]
    }

    /// The data query restricted to one page.
    pub fn paged(&self, paging: &Paging) -> String {
        format!(
            "{} LIMIT {} OFFSET {}",
            self.data,
            paging.limit(),
            paging.offset()
        )
    }
}

/// Compile a criteria into SQL.
///
/// Fails when an entity referenced by a multi-entity query is not known to
/// `provider`. Nothing is returned on failure.
pub fn compile(criteria: &Criteria, provider: &dyn MetadataProvider) -> CriteriaResult<CompiledSql> {
    let mut sql = String::from("SELECT ");
    sql.push_str(PROJECTION_TAG);

    let multi = criteria.source_script(&mut sql);

    let mut binds = Vec::new();
    let group_by = render_where(&mut sql, criteria.nodes(), &mut binds);

    if let Some(order) = criteria.order_by() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.property);
        sql.push(' ');
        sql.push_str(order.direction.sql());
    }

    let template = sql;
    let data = template.replace(PROJECTION_TAG, &criteria.default_projection());
    let count = template.replace(PROJECTION_TAG, "COUNT(*) count");

    let (data, template, count, group_column, mapper) = if multi {
        let mapping = FetchMapping::build(&data, provider)?;
        let group_column = group_by.map(|n| mapping.rewrite(&n.key));
        (
            mapping.rewrite(&data),
            mapping.rewrite(&template),
            mapping.rewrite(&count),
            group_column,
            Some(mapping.into_mapper()),
        )
    } else {
        let meta = provider.resolve(criteria.entity())?;
        let group_column = group_by.map(|n| mapper::rewrite_single(&n.key, &meta));
        (
            mapper::rewrite_single(&data, &meta),
            mapper::rewrite_single(&template, &meta),
            mapper::rewrite_single(&count, &meta),
            group_column,
            None,
        )
    };

    let count = match group_column {
        Some(column) => grouped_count(&data, &column),
        None => count,
    };

    tracing::debug!(
        entity = criteria.entity(),
        multi,
        binds = binds.len(),
        "criteria compiled"
    );
    tracing::trace!(sql = %data, "data query");

    Ok(CompiledSql {
        count,
        data,
        template,
        binds,
        mapper,
    })
}

/// Append the WHERE clause. Returns the group-by marker, which is not rendered.
fn render_where<'a>(
    sql: &mut String,
    nodes: &'a [PredicateNode],
    binds: &mut Vec<Value>,
) -> Option<&'a PredicateNode> {
    let mut group_by = None;
    let mut first = true;
    for node in nodes {
        if node.is_group_by() {
            group_by = Some(node);
            continue;
        }
        if !renders(node) {
            continue;
        }
        if first {
            sql.push_str(" WHERE ");
            first = false;
        } else {
            push_conjunction(sql, node);
        }
        render_node(sql, node, binds);
    }
    group_by
}

fn renders(node: &PredicateNode) -> bool {
    match &node.value {
        NodeValue::Group(children) => children.iter().any(renders),
        NodeValue::List(values) => !values.is_empty(),
        NodeValue::Marker => false,
        NodeValue::Scalar(_) | NodeValue::Range(_) => true,
    }
}

fn push_conjunction(sql: &mut String, node: &PredicateNode) {
    sql.push(' ');
    sql.push_str(node.conjunction.sql());
    sql.push(' ');
}

fn render_node(sql: &mut String, node: &PredicateNode, binds: &mut Vec<Value>) {
    match &node.value {
        NodeValue::Group(children) => {
            sql.push('(');
            let mut first = true;
            for child in children.iter().filter(|c| renders(c)) {
                if !first {
                    push_conjunction(sql, child);
                }
                first = false;
                render_node(sql, child, binds);
            }
            sql.push(')');
        }
        NodeValue::Scalar(value) => {
            sql.push_str(&format!("{} {} ?", node.key, node.predicate.sql()));
            binds.push(value.clone().into_bind());
        }
        NodeValue::Range(MinMax { min, max }) => {
            sql.push_str(&format!("{} {} ? AND ?", node.key, node.predicate.sql()));
            binds.push(min.clone().into_bind());
            binds.push(max.clone().into_bind());
        }
        NodeValue::List(values) => {
            sql.push_str(&format!(
                "{} {} ({})",
                node.key,
                node.predicate.sql(),
                in_list(values)
            ));
        }
        NodeValue::Marker => {}
    }
}

/// Inline literal list. Numeric when the first element is numeric, quoted
/// otherwise.
fn in_list(values: &[Value]) -> String {
    let numeric = values.first().is_some_and(Value::is_numeric);
    values
        .iter()
        .map(|v| v.to_literal(!numeric))
        .collect::<Vec<_>>()
        .join(",")
}

/// `SELECT COUNT(tc.col) count FROM (<data>) tc`, with `count` aliases in the
/// wrapped projection renamed so the outer alias stays unambiguous.
fn grouped_count(data: &str, group_column: &str) -> String {
    let column = group_column.rsplit('.').next().unwrap_or(group_column);
    let data = data.split_whitespace().collect::<Vec<_>>().join(" ");
    let inner = match data.find(" FROM ") {
        Some(at) => {
            let (projection, rest) = data.split_at(at);
            format!("{}{}", rename_count_alias(projection), rest)
        }
        None => data,
    };
    format!("SELECT COUNT(tc.{}) count FROM ({}) tc", column, inner)
}

/// `COUNT(x) count, y` -> `COUNT(x) _count, y`. Columns named `count` are kept.
fn rename_count_alias(projection: &str) -> String {
    let projection = projection.replace(")count", ") count");
    let words: Vec<&str> = projection.split(' ').collect();
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let (name, comma) = match word.strip_suffix(',') {
                Some(name) => (name, ","),
                None => (*word, ""),
            };
            let alias = i > 0
                && name == "count"
                && !words[i - 1].ends_with(',')
                && !words[i - 1].eq_ignore_ascii_case("SELECT")
                && !words[i - 1].eq_ignore_ascii_case("DISTINCT");
            if alias {
                format!("_count{}", comma)
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CriteriaBuilder, Scope};
    use crate::ast::Direction;
    use crate::metadata::{EntityMetadata, Registry, ScalarKind};
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Registry::new().with(
            EntityMetadata::new("User", "t_user")
                .field("id", ScalarKind::Long)
                .field("age", ScalarKind::Int)
                .field("name", ScalarKind::Text)
                .field("status", ScalarKind::Text)
                .field_as("createdAt", "create_time", ScalarKind::Timestamp),
        )
    }

    fn builder() -> CriteriaBuilder {
        CriteriaBuilder::new(&registry(), "User").unwrap()
    }

    #[test]
    fn test_simple_select() {
        let sql = compile(&builder().build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user");
        assert_eq!(sql.template, "SELECT ${PROJECTION} FROM t_user");
        assert_eq!(sql.count, "SELECT COUNT(*) count FROM t_user");
        assert!(sql.binds.is_empty());
    }

    #[test]
    fn test_eq_then_or() {
        let mut b = builder();
        b.eq("age", 1).unwrap().or().eq("id", 2).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user WHERE age = ? OR id = ?");
        assert_eq!(sql.binds, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_null_filter_leaves_where_untouched() {
        let mut b = builder();
        b.eq("name", Value::Null).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user");
    }

    #[test]
    fn test_between_binds_in_order() {
        let mut b = builder();
        b.between("age", 18, 65).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user WHERE age BETWEEN ? AND ?");
        assert_eq!(sql.binds, vec![Value::Int(18), Value::Int(65)]);
    }

    #[test]
    fn test_in_lists_are_inlined() {
        let mut b = builder();
        b.is_in("id", [1, 2, 2, 3]).unwrap();
        b.is_in("name", [Some("a"), None, Some("b")]).unwrap();
        b.not_in("status", ["x'y"]).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(
            sql.data,
            "SELECT * FROM t_user WHERE id IN (1,2,3) AND name IN ('a','b') AND status NOT IN ('x''y')"
        );
        assert!(sql.binds.is_empty());
    }

    #[test]
    fn test_like_binds_wildcards() {
        let mut b = builder();
        b.like("name", "x").unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user WHERE name LIKE ?");
        assert_eq!(sql.binds, vec![Value::from("%x%")]);
    }

    #[test]
    fn test_nested_groups_and_bind_order() {
        let mut b = builder();
        b.eq("status", "ACTIVE").unwrap();
        {
            let mut g = b.and().x();
            g.gt("age", 18).unwrap();
            let mut inner = g.or().x();
            inner.like("name", "a").unwrap().and().lt("id", 100).unwrap();
        }
        b.not("name", "root").unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(
            sql.data,
            "SELECT * FROM t_user WHERE status = ? AND (age > ? OR (name LIKE ? AND id < ?)) AND name != ?"
        );
        assert_eq!(
            sql.binds,
            vec![
                Value::from("ACTIVE"),
                Value::Int(18),
                Value::from("%a%"),
                Value::Int(100),
                Value::from("root"),
            ]
        );
    }

    #[test]
    fn test_enum_bound_as_text() {
        let mut b = builder();
        b.eq("status", Value::enumeration("PAID")).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.binds, vec![Value::String("PAID".to_string())]);
    }

    #[test]
    fn test_property_renamed_to_column() {
        let mut b = builder();
        b.gte("createdAt", "2024-01-01").unwrap();
        b.order_by("createdAt", Direction::Desc).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(
            sql.data,
            "SELECT * FROM t_user WHERE create_time >= ? ORDER BY create_time DESC"
        );
        assert_eq!(
            sql.count,
            "SELECT COUNT(*) count FROM t_user WHERE create_time >= ? ORDER BY create_time DESC"
        );
    }

    #[test]
    fn test_group_by_count() {
        let mut b = builder();
        b.eq("age", 30).unwrap();
        b.group_by("createdAt").unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user WHERE age = ?");
        assert_eq!(
            sql.count,
            "SELECT COUNT(tc.create_time) count FROM (SELECT * FROM t_user WHERE age = ?) tc"
        );
        assert_eq!(sql.binds, vec![Value::Int(30)]);
    }

    #[test]
    fn test_grouped_count_renames_inner_alias() {
        let count = grouped_count("SELECT  COUNT(t.id) count,  t.g FROM t", "g");
        assert_eq!(
            count,
            "SELECT COUNT(tc.g) count FROM (SELECT COUNT(t.id) _count, t.g FROM t) tc"
        );
    }

    #[test]
    fn test_grouped_count_keeps_count_column() {
        let registry = Registry::new().with(
            EntityMetadata::new("Stat", "t_stat")
                .field("day", ScalarKind::Text)
                .field_as("total", "count", ScalarKind::Int),
        );
        let mut b = CriteriaBuilder::new(&registry, "Stat").unwrap();
        b.eq("total", 5).unwrap();
        b.group_by("day").unwrap();
        let sql = compile(&b.build(), &registry).unwrap();
        assert_eq!(
            sql.count,
            "SELECT COUNT(tc.day) count FROM (SELECT * FROM t_stat WHERE count = ?) tc"
        );
        assert_eq!(
            grouped_count("SELECT count, x count FROM t WHERE count = ?", "x"),
            "SELECT COUNT(tc.x) count FROM (SELECT count, x _count FROM t WHERE count = ?) tc"
        );
    }

    #[test]
    fn test_lte_renders() {
        let mut b = builder();
        b.lte("age", 65).unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT * FROM t_user WHERE age <= ?");
        assert_eq!(sql.binds, vec![Value::Int(65)]);
    }

    #[test]
    fn test_fetch_lists_on_qualified_keys() {
        let registry = registry().with(
            EntityMetadata::new("Order", "t_order")
                .field("id", ScalarKind::Long)
                .field("userId", ScalarKind::Long)
                .field("state", ScalarKind::Text),
        );
        let mut b = CriteriaBuilder::fetch(&registry, "User", None).unwrap();
        b.select("User.name as name").unwrap();
        b.source_script("User INNER JOIN Order ON Order.userId = User.id");
        b.is_in("Order->id", [7, 8]).unwrap();
        b.not_in("Order->state", ["CLOSED", ""]).unwrap();
        let sql = compile(&b.build(), &registry).unwrap();
        assert_eq!(
            sql.data,
            "SELECT t_user.name AS name FROM t_user INNER JOIN t_order ON t_order.user_id = t_user.id \
             WHERE t_order.id IN (7,8) AND t_order.state NOT IN ('CLOSED')"
        );
        assert!(sql.binds.is_empty());
    }

    #[test]
    fn test_alias_matching_property_is_kept() {
        let mut b = CriteriaBuilder::fetch(&registry(), "User", None).unwrap();
        b.select("User.createdAt as createdAt").unwrap();
        let sql = compile(&b.build(), &registry()).unwrap();
        assert_eq!(sql.data, "SELECT t_user.create_time AS createdAt FROM t_user");
    }

    #[test]
    fn test_compile_is_idempotent() {
        let mut b = builder();
        b.eq("age", 3).unwrap().or().like("name", "z").unwrap();
        let criteria = b.build();
        let first = compile(&criteria, &registry()).unwrap();
        let second = compile(&criteria, &registry()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_paged_data() {
        let sql = compile(&builder().build(), &registry()).unwrap();
        assert_eq!(
            sql.paged(&Paging::new(3, 10)),
            "SELECT * FROM t_user LIMIT 10 OFFSET 20"
        );
    }
}
