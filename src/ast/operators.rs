use serde::{Deserialize, Serialize};

/// Comparison operator of a predicate node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Equal (=)
    Eq,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Not equal (!=)
    Not,
    /// LIKE '%value%'
    Like,
    /// BETWEEN min AND max
    Between,
    /// IN (literal list)
    In,
    /// NOT IN (literal list)
    NotIn,
    /// Parenthesized sub-group; the node value holds the children.
    Group,
}

impl Predicate {
    /// Returns the SQL token for this operator.
    pub fn sql(&self) -> &'static str {
        match self {
            Predicate::Eq => "=",
            Predicate::Lt => "<",
            Predicate::Lte => "<=",
            Predicate::Gt => ">",
            Predicate::Gte => ">=",
            Predicate::Not => "!=",
            Predicate::Like => "LIKE",
            Predicate::Between => "BETWEEN",
            Predicate::In => "IN",
            Predicate::NotIn => "NOT IN",
            Predicate::Group => "",
        }
    }

    /// Returns true if this operator renders as `column OP ?` with one bind.
    pub fn is_simple_binary(&self) -> bool {
        matches!(
            self,
            Predicate::Eq
                | Predicate::Lt
                | Predicate::Lte
                | Predicate::Gt
                | Predicate::Gte
                | Predicate::Not
                | Predicate::Like
        )
    }
}

/// Combinator placed before a node when it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Conjunction {
    #[default]
    And,
    Or,
    /// Marker: the node records a grouping column and is never rendered in WHERE.
    GroupBy,
    OrderBy,
}

impl Conjunction {
    pub fn sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
            Conjunction::GroupBy => "GROUP BY",
            Conjunction::OrderBy => "ORDER BY",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql())
    }
}
