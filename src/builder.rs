//! Fluent construction of a [`Criteria`].
//!
//! Every builder call goes through a [`Scope`]: the top-level
//! [`CriteriaBuilder`] or a parenthesized [`SubGroup`]. `and()` / `or()` on a
//! scope return a [`Clause`] carrying that conjunction; a leaf call on the
//! clause (`eq`, `like`, ...) appends one node and hands the scope back.
//!
//! ```
//! use criteria_sql::prelude::*;
//!
//! let registry = Registry::new().with(
//!     EntityMetadata::new("User", "t_user")
//!         .field("age", ScalarKind::Int)
//!         .field("name", ScalarKind::Text),
//! );
//!
//! let mut builder = CriteriaBuilder::new(&registry, "User").unwrap();
//! builder.eq("age", 30).unwrap();
//! {
//!     let mut group = builder.and().x();
//!     group.like("name", "ann").unwrap().or().like("name", "bob").unwrap();
//! }
//! let sql = compile(&builder.build(), &registry).unwrap();
//! assert_eq!(
//!     sql.data,
//!     "SELECT * FROM t_user WHERE age = ? AND (name LIKE ? OR name LIKE ?)"
//! );
//! ```
//!
//! Absent values are dropped instead of rejected: `Value::Null`, empty
//! strings and the zero value of a primitive field all make the call a no-op,
//! so optional filters can be passed unconditionally.

use std::mem;
use std::sync::Arc;

use crate::ast::{Conjunction, Direction, MinMax, NodeValue, Predicate, PredicateNode, Value};
use crate::criteria::{Criteria, FetchRequest, OrderBy, Paging};
use crate::error::{CriteriaError, CriteriaResult};
use crate::metadata::{EntityMetadata, MetadataProvider};
use crate::parser;

/// A place predicate nodes are appended to.
pub trait Scope {
    /// Append a finished node.
    fn push(&mut self, node: PredicateNode);

    /// Metadata of the criteria's target entity.
    fn target(&self) -> &EntityMetadata;

    /// Fetch mode skips property existence checks.
    fn is_fetch(&self) -> bool;

    /// Parenthesis depth of this scope, 0 at the top level.
    fn depth(&self) -> usize {
        0
    }

    fn and(&mut self) -> Clause<'_, Self>
    where
        Self: Sized,
    {
        Clause::new(self, Conjunction::And)
    }

    fn or(&mut self) -> Clause<'_, Self>
    where
        Self: Sized,
    {
        Clause::new(self, Conjunction::Or)
    }

    fn eq(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().eq(property, value)
    }

    fn lt(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().lt(property, value)
    }

    fn lte(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().lte(property, value)
    }

    fn gt(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().gt(property, value)
    }

    fn gte(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().gte(property, value)
    }

    fn not(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().not(property, value)
    }

    fn like(&mut self, property: &str, value: impl Into<Value>) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().like(property, value)
    }

    fn between(
        &mut self,
        property: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().between(property, min, max)
    }

    fn is_in<V: Into<Value>>(
        &mut self,
        property: &str,
        values: impl IntoIterator<Item = V>,
    ) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().is_in(property, values)
    }

    fn not_in<V: Into<Value>>(
        &mut self,
        property: &str,
        values: impl IntoIterator<Item = V>,
    ) -> CriteriaResult<&mut Self>
    where
        Self: Sized,
    {
        self.and().not_in(property, values)
    }
}

// ========================================================================
// Clause
// ========================================================================

/// A pending sibling node: the conjunction is fixed, the predicate is chosen
/// by the leaf call.
#[must_use = "a clause appends nothing until a predicate method is called"]
pub struct Clause<'a, S: Scope + ?Sized> {
    scope: &'a mut S,
    conjunction: Conjunction,
}

impl<'a, S: Scope + ?Sized> Clause<'a, S> {
    pub(crate) fn new(scope: &'a mut S, conjunction: Conjunction) -> Self {
        Self { scope, conjunction }
    }

    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    pub fn eq(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        self.compare(Predicate::Eq, property, value.into())
    }

    pub fn lt(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        self.compare(Predicate::Lt, property, value.into())
    }

    pub fn lte(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        self.compare(Predicate::Lte, property, value.into())
    }

    pub fn gt(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        self.compare(Predicate::Gt, property, value.into())
    }

    pub fn gte(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        self.compare(Predicate::Gte, property, value.into())
    }

    pub fn not(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        self.compare(Predicate::Not, property, value.into())
    }

    /// `property LIKE '%value%'`.
    pub fn like(self, property: &str, value: impl Into<Value>) -> CriteriaResult<&'a mut S> {
        let key = check(&*self.scope, property)?;
        let value = value.into();
        if suppressed(&*self.scope, property, &value) {
            return Ok(self.scope);
        }
        let pattern = Value::String(format!("%{}%", value));
        Ok(self.append(Predicate::Like, key, NodeValue::Scalar(pattern)))
    }

    /// `property BETWEEN min AND max`; dropped unless both bounds are present.
    pub fn between(
        self,
        property: &str,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> CriteriaResult<&'a mut S> {
        let key = check(&*self.scope, property)?;
        let (min, max) = (min.into(), max.into());
        if suppressed(&*self.scope, property, &min)
            || suppressed(&*self.scope, property, &max)
        {
            return Ok(self.scope);
        }
        Ok(self.append(
            Predicate::Between,
            key,
            NodeValue::Range(MinMax { min, max }),
        ))
    }

    /// `property IN (...)`, values inlined as literals.
    pub fn is_in<V: Into<Value>>(
        self,
        property: &str,
        values: impl IntoIterator<Item = V>,
    ) -> CriteriaResult<&'a mut S> {
        self.list(Predicate::In, property, values)
    }

    /// `property NOT IN (...)`, values inlined as literals.
    pub fn not_in<V: Into<Value>>(
        self,
        property: &str,
        values: impl IntoIterator<Item = V>,
    ) -> CriteriaResult<&'a mut S> {
        self.list(Predicate::NotIn, property, values)
    }

    /// Open a parenthesized sub-group joined to the scope with this clause's
    /// conjunction.
    pub fn x(self) -> SubGroup<'a, S> {
        SubGroup {
            parent: self.scope,
            conjunction: self.conjunction,
            nodes: Vec::new(),
        }
    }

    fn compare(self, predicate: Predicate, property: &str, value: Value) -> CriteriaResult<&'a mut S> {
        let key = check(&*self.scope, property)?;
        if suppressed(&*self.scope, property, &value) {
            return Ok(self.scope);
        }
        Ok(self.append(predicate, key, NodeValue::Scalar(value)))
    }

    fn list<V: Into<Value>>(
        self,
        predicate: Predicate,
        property: &str,
        values: impl IntoIterator<Item = V>,
    ) -> CriteriaResult<&'a mut S> {
        let key = check(&*self.scope, property)?;
        let mut distinct: Vec<Value> = Vec::new();
        for value in values.into_iter().map(Into::into) {
            if !value.is_null_or_empty() && !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        if distinct.is_empty() {
            tracing::trace!(property, "empty list, filter dropped");
            return Ok(self.scope);
        }
        Ok(self.append(predicate, key, NodeValue::List(distinct)))
    }

    fn append(self, predicate: Predicate, key: String, value: NodeValue) -> &'a mut S {
        self.scope
            .push(PredicateNode::leaf(self.conjunction, predicate, key, value));
        self.scope
    }
}

// ========================================================================
// SubGroup
// ========================================================================

/// A parenthesized sub-expression under construction.
///
/// The group is appended to its parent as one `GROUP` node when it is closed
/// or dropped. A group that received no predicates appends nothing.
pub struct SubGroup<'p, S: Scope + ?Sized> {
    parent: &'p mut S,
    conjunction: Conjunction,
    nodes: Vec<PredicateNode>,
}

impl<S: Scope + ?Sized> SubGroup<'_, S> {
    /// Predicates collected so far.
    pub fn nodes(&self) -> &[PredicateNode] {
        &self.nodes
    }

    /// Close the group and append it to the parent.
    pub fn close(self) {}
}

impl<S: Scope + ?Sized> Scope for SubGroup<'_, S> {
    fn push(&mut self, node: PredicateNode) {
        self.nodes.push(node);
    }

    fn target(&self) -> &EntityMetadata {
        self.parent.target()
    }

    fn is_fetch(&self) -> bool {
        self.parent.is_fetch()
    }

    fn depth(&self) -> usize {
        self.parent.depth() + 1
    }
}

impl<S: Scope + ?Sized> Drop for SubGroup<'_, S> {
    fn drop(&mut self) {
        let nodes = mem::take(&mut self.nodes);
        if !nodes.is_empty() {
            self.parent.push(PredicateNode::group(self.conjunction, nodes));
        }
    }
}

// ========================================================================
// CriteriaBuilder
// ========================================================================

/// Builds a [`Criteria`] for one query.
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    criteria: Criteria,
}

impl CriteriaBuilder {
    /// Builder with schema-checked properties on `entity`.
    pub fn new(provider: &dyn MetadataProvider, entity: &str) -> CriteriaResult<Self> {
        Ok(Self::from_metadata(provider.resolve(entity)?))
    }

    /// Builder seeded with paging.
    pub fn paged_by(
        provider: &dyn MetadataProvider,
        entity: &str,
        paging: Option<Paging>,
    ) -> CriteriaResult<Self> {
        let mut builder = Self::new(provider, entity)?;
        builder.criteria.paging = paging;
        Ok(builder)
    }

    pub fn from_metadata(metadata: Arc<EntityMetadata>) -> Self {
        Self {
            criteria: Criteria::new(metadata),
        }
    }

    /// Fetch-mode builder: properties may be qualified with other entities
    /// and the projection list is explicit. Result keys and paging are taken
    /// from `request` when given.
    pub fn fetch(
        provider: &dyn MetadataProvider,
        entity: &str,
        request: Option<&FetchRequest>,
    ) -> CriteriaResult<Self> {
        let mut builder = Self {
            criteria: Criteria::fetch(provider.resolve(entity)?),
        };
        if let Some(request) = request {
            for key in &request.result_keys {
                builder.select_x(key)?;
            }
            builder.criteria.paging = request.paging();
        }
        Ok(builder)
    }

    /// Add a trusted projection: `Entity.property` or `Entity.property as alias`.
    pub fn select(&mut self, projection: &str) -> CriteriaResult<&mut Self> {
        let projection = parser::projection(projection)?;
        self.projections()?.push(projection);
        Ok(self)
    }

    /// Add a projection from x-expression text (`Order->id.as.oid`).
    pub fn select_x(&mut self, expression: &str) -> CriteriaResult<&mut Self> {
        let projection = parser::x_expression(expression)?.to_string();
        self.projections()?.push(projection);
        Ok(self)
    }

    /// Use a raw multi-table FROM source, e.g.
    /// `Order INNER JOIN Customer ON Order.customerId = Customer.id`.
    pub fn source_script(&mut self, script: impl Into<String>) -> &mut Self {
        self.criteria.source = Some(script.into());
        self
    }

    /// Record the grouping column; drives the count query only.
    pub fn group_by(&mut self, property: &str) -> CriteriaResult<&mut Self> {
        let key = check(&*self, property)?;
        self.criteria.nodes.retain(|n| !n.is_group_by());
        self.criteria.nodes.push(PredicateNode::group_by(key));
        Ok(self)
    }

    pub fn order_by(&mut self, property: &str, direction: Direction) -> CriteriaResult<&mut Self> {
        let property = check(&*self, property)?;
        self.criteria.order_by = Some(OrderBy {
            property,
            direction,
        });
        Ok(self)
    }

    pub fn paged(&mut self, paging: Paging) -> &mut Self {
        self.criteria.paging = Some(paging);
        self
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn build(self) -> Criteria {
        self.criteria
    }

    fn projections(&mut self) -> CriteriaResult<&mut Vec<String>> {
        let entity = &self.criteria.metadata.name;
        self.criteria
            .projections
            .as_mut()
            .ok_or_else(|| CriteriaError::NotFetch(entity.clone()))
    }
}

impl Scope for CriteriaBuilder {
    fn push(&mut self, node: PredicateNode) {
        self.criteria.nodes.push(node);
    }

    fn target(&self) -> &EntityMetadata {
        &self.criteria.metadata
    }

    fn is_fetch(&self) -> bool {
        self.criteria.is_fetch()
    }
}

// ========================================================================
// Helpers
// ========================================================================

/// Validate a property reference and return the key to store.
///
/// Schema mode requires the property to exist on the target entity. Fetch
/// mode accepts `Entity.property`, `Entity->property` or `property` as-is.
fn check<S: Scope + ?Sized>(scope: &S, property: &str) -> CriteriaResult<String> {
    if scope.is_fetch() {
        return Ok(property.replace("->", "."));
    }
    let target = scope.target();
    match target.get(property) {
        Some(_) => Ok(property.to_string()),
        None => Err(CriteriaError::unknown_property(property, &target.name)),
    }
}

/// The last path segment of `Entity.property`, `Entity->property` or
/// `property alias`.
fn trailing_property(property: &str) -> String {
    let head = property.split(' ').next().unwrap_or(property);
    let normalized = head.replace("->", ".");
    let mut parts = normalized.split('.');
    let first = parts.next().unwrap_or_default();
    parts.next().unwrap_or(first).to_string()
}

fn suppressed<S: Scope + ?Sized>(scope: &S, property: &str, value: &Value) -> bool {
    let field = scope.target().get(&trailing_property(property));
    let absent = value.is_null_or_empty() || value.is_zero_for(field);
    if absent {
        tracing::trace!(property, value = %value, "absent value, filter dropped");
    }
    absent
}
