//! Axon Query Construction
//!
//! Axon expressions are opaque strings as far as the client is concerned.
//! This module only knows how to build the common tag-filter form:
//!
//! - **AxonQuery**: an expression ready to be sent to the eval endpoint
//! - **TagFilter**: ordered tag → value entries rendered as `readAll(...)`
//!
//! # Examples
//!
//! ```rust
//! use axon_client::query::{FilterValue, TagFilter};
//!
//! let query = TagFilter::new()
//!     .marker("point")
//!     .marker("temp")
//!     .with("siteRef", "p:demo:r:1eeb")
//!     .with("navName", FilterValue::Str("Discharge Air Temp".into()))
//!     .to_query()?
//!     .his_read("yesterday");
//!
//! assert_eq!(
//!     query.as_str(),
//!     r#"readAll(point and temp and siteRef==@p:demo:r:1eeb and navName=="Discharge Air Temp").hisRead(yesterday)"#
//! );
//! # Ok::<(), axon_client::query::QueryError>(())
//! ```

mod builder;
mod error;

pub use builder::{FilterValue, TagFilter};
pub use error::{QueryError, QueryResult};

/// An Axon expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AxonQuery(String);

impl AxonQuery {
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chain a history read over `range` (e.g. `yesterday`, `today`,
    /// `2024-01-01..2024-01-31`)
    pub fn his_read(self, range: &str) -> Self {
        Self(format!("{}.hisRead({})", self.0, range))
    }
}

impl std::fmt::Display for AxonQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AxonQuery {
    fn from(expr: &str) -> Self {
        Self::new(expr)
    }
}

impl From<String> for AxonQuery {
    fn from(expr: String) -> Self {
        Self(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_his_read_chaining() {
        let query = AxonQuery::from("read(point and power)").his_read("today");
        assert_eq!(query.to_string(), "read(point and power).hisRead(today)");
    }
}
