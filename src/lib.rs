//! # criteria-sql
//!
//! Build filter criteria against logical entities, compile them into SQL.
//!
//! A [`Criteria`](criteria::Criteria) is a flat list of predicate nodes joined
//! by `AND` / `OR`, with parenthesized sub-groups, an optional sort and an
//! optional grouping column. Compiling it yields three statements that share
//! one WHERE clause and one bind list:
//!
//! - `count`: `SELECT COUNT(*) count FROM ...`
//! - `data`: the rows themselves
//! - `template`: `SELECT ${PROJECTION} FROM ...` for caller-chosen columns
//!
//! Property names are written against the entity model (`createdAt`,
//! `Order.customerId`) and resolved to physical columns (`create_time`,
//! `t_order.customer_id`) through a [`MetadataProvider`](metadata::MetadataProvider).
//!
//! ## Quick Example
//!
//! ```
//! use criteria_sql::prelude::*;
//!
//! let registry = Registry::new().with(
//!     EntityMetadata::new("User", "t_user")
//!         .field("age", ScalarKind::Int)
//!         .field("createdAt", ScalarKind::Timestamp),
//! );
//!
//! let mut builder = CriteriaBuilder::new(&registry, "User").unwrap();
//! builder.gte("age", 18).unwrap();
//! builder.order_by("createdAt", Direction::Desc).unwrap();
//!
//! let sql = criteria_sql::compile(&builder.build(), &registry).unwrap();
//! assert_eq!(sql.data, "SELECT * FROM t_user WHERE age >= ? ORDER BY created_at DESC");
//! assert_eq!(sql.count, "SELECT COUNT(*) count FROM t_user WHERE age >= ? ORDER BY created_at DESC");
//! assert_eq!(sql.binds, vec![Value::Int(18)]);
//! ```
//!
//! ## Absent values
//!
//! | Value                                   | Effect            |
//! |-----------------------------------------|-------------------|
//! | `Value::Null`, `None`                   | filter dropped    |
//! | `""`, empty list                        | filter dropped    |
//! | `0` on a non-nullable numeric field     | filter dropped    |
//! | `0` on a nullable field                 | filter kept       |

pub mod ast;
pub mod builder;
pub mod config;
pub mod criteria;
pub mod document;
pub mod error;
pub mod mapper;
pub mod metadata;
pub mod parser;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::builder::{Clause, CriteriaBuilder, Scope, SubGroup};
    pub use crate::criteria::{Criteria, FetchRequest, OrderBy, PROJECTION_TAG, Paging};
    pub use crate::document::QueryDocument;
    pub use crate::error::*;
    pub use crate::mapper::NameMapper;
    pub use crate::metadata::{EntityMetadata, FieldMeta, MetadataProvider, Registry, ScalarKind};
    pub use crate::transpiler::{CompiledSql, compile};
}

/// Compile a criteria into count, data and template SQL.
///
/// # Example
///
/// ```
/// use criteria_sql::prelude::*;
///
/// let registry = Registry::new().with(EntityMetadata::new("User", "t_user"));
/// let criteria = CriteriaBuilder::new(&registry, "User").unwrap().build();
/// let sql = criteria_sql::compile(&criteria, &registry).unwrap();
/// assert_eq!(sql.template, "SELECT ${PROJECTION} FROM t_user");
/// ```
pub fn compile(
    criteria: &criteria::Criteria,
    provider: &dyn metadata::MetadataProvider,
) -> error::CriteriaResult<transpiler::CompiledSql> {
    transpiler::compile(criteria, provider)
}
