use serde::Serialize;

use super::{Conjunction, MinMax, Predicate, Value};

/// Value carried by a [`PredicateNode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeValue {
    /// Single bind value.
    Scalar(Value),
    /// BETWEEN bounds.
    Range(MinMax),
    /// IN / NOT IN list, already de-duplicated.
    List(Vec<Value>),
    /// Parenthesized sub-expression.
    Group(Vec<PredicateNode>),
    /// Group-by marker, carries nothing.
    Marker,
}

/// One clause, one parenthesized sub-group, or one group-by marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredicateNode {
    pub conjunction: Conjunction,
    pub predicate: Predicate,
    /// Property reference as written by the caller (`age`, `Order.id`).
    pub key: String,
    pub value: NodeValue,
}

impl PredicateNode {
    pub fn leaf(
        conjunction: Conjunction,
        predicate: Predicate,
        key: impl Into<String>,
        value: NodeValue,
    ) -> Self {
        Self {
            conjunction,
            predicate,
            key: key.into(),
            value,
        }
    }

    pub fn group(conjunction: Conjunction, children: Vec<PredicateNode>) -> Self {
        Self {
            conjunction,
            predicate: Predicate::Group,
            key: String::new(),
            value: NodeValue::Group(children),
        }
    }

    pub fn group_by(key: impl Into<String>) -> Self {
        Self {
            conjunction: Conjunction::GroupBy,
            predicate: Predicate::Eq,
            key: key.into(),
            value: NodeValue::Marker,
        }
    }

    pub fn is_group_by(&self) -> bool {
        self.conjunction == Conjunction::GroupBy
    }

    /// Children of a sub-group node.
    pub fn children(&self) -> Option<&[PredicateNode]> {
        match &self.value {
            NodeValue::Group(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Nesting depth, 0 for a leaf.
    pub fn depth(&self) -> usize {
        self.children()
            .map_or(0, |c| 1 + c.iter().map(PredicateNode::depth).max().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_depth() {
        let leaf = PredicateNode::leaf(
            Conjunction::And,
            Predicate::Eq,
            "a",
            NodeValue::Scalar(Value::Int(1)),
        );
        let inner = PredicateNode::group(Conjunction::Or, vec![leaf.clone()]);
        let outer = PredicateNode::group(Conjunction::And, vec![leaf.clone(), inner]);
        assert_eq!(leaf.depth(), 0);
        assert_eq!(outer.depth(), 2);
        assert_eq!(outer.children().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_group_by_marker() {
        let node = PredicateNode::group_by("status");
        assert!(node.is_group_by());
        assert_eq!(node.value, NodeValue::Marker);
    }
}
