//! Predicate tree model.
//!
//! A [`Criteria`](crate::criteria::Criteria) holds an ordered list of
//! [`PredicateNode`]s. Each node is either a leaf clause (`age > ?`), a
//! parenthesized sub-group of further nodes, or a group-by marker that only
//! drives count-query rewriting.

pub mod node;
pub mod operators;
pub mod values;

pub use node::*;
pub use operators::*;
pub use values::*;
