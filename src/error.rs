//! Error types for criteria compilation.

use thiserror::Error;

/// The main error type for building and compiling criteria.
///
/// Every variant is fatal for the call that raised it: no partial SQL is
/// ever returned. Absent filter values are not errors, they are dropped by
/// the builder.
#[derive(Debug, Error)]
pub enum CriteriaError {
    /// Property is not declared on the target entity (schema mode).
    #[error("Unknown property '{property}' on entity '{entity}'")]
    UnknownProperty { property: String, entity: String },

    /// Projection or x-expression text that cannot be accepted.
    #[error("Malformed expression: '{0}'")]
    MalformedExpression(String),

    /// Projection added to a criteria that is not in fetch mode.
    #[error("Projection requires a fetch criteria on '{0}'")]
    NotFetch(String),

    /// Entity has no registered metadata.
    #[error("Entity not registered: '{0}'")]
    UnknownEntity(String),

    /// Invalid schema document.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid query document.
    #[error("Query document error: {0}")]
    Document(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CriteriaError {
    /// Create an unknown property error.
    pub fn unknown_property(property: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::UnknownProperty {
            property: property.into(),
            entity: entity.into(),
        }
    }

    /// Create a malformed expression error.
    pub fn malformed(expr: impl Into<String>) -> Self {
        Self::MalformedExpression(expr.into())
    }
}

/// Result type alias for criteria operations.
pub type CriteriaResult<T> = Result<T, CriteriaError>;
