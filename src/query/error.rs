//! Query error types

use thiserror::Error;

/// Errors that can occur while building a query
#[derive(Error, Debug)]
pub enum QueryError {
    /// No serialization rule applies to the tag's name
    #[error("Cannot infer filter kind for tag `{tag}` (value `{value}`); use an explicit FilterValue")]
    UnclassifiedTag { tag: String, value: String },

    /// Tag names are single identifiers
    #[error("Invalid tag name: {0:?}")]
    InvalidTag(String),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
