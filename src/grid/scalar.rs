//! Typed grid scalars
//!
//! JSON grids carry every cell as a string with a kind prefix:
//!
//! ```text
//! t:2017-11-26T00:25:00-08:00 Los_Angeles    timestamp, offset + tz name
//! n:74.5999984741211 °F                      number, unit
//! Building 77                                plain text
//! ```
//!
//! [`ScalarParser`] strips the prefix and the trailing annotation and parses
//! the core. It has no notion of which column is the index; callers decide
//! what a `Timestamp` in a value column means.

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;

/// Timestamp core layout after the `t:` prefix
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// `t:` cell; wall-clock time with the zone annotation dropped
    Timestamp(NaiveDateTime),
    /// `n:` cell with the unit dropped
    Number(f64),
    /// Cell without a recognised prefix
    Text(String),
    /// Prefixed cell whose core didn't parse
    Unparseable(String),
}

impl Scalar {
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Scalar::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Compiled scalar patterns
#[derive(Debug, Clone)]
pub struct ScalarParser {
    timestamp: Regex,
    number: Regex,
}

impl ScalarParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            timestamp: Regex::new(r"^t:([0-9T:\-]{19})(.*)$")?,
            number: Regex::new(
                r"^n:(-?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+\-]?[0-9]+)?)(?:\s+.*)?$",
            )?,
        })
    }

    /// Parse one cell string
    pub fn parse(&self, cell: &str) -> Scalar {
        if cell.starts_with("t:") {
            return self
                .timestamp
                .captures(cell)
                .and_then(|caps| {
                    NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok()
                })
                .map(Scalar::Timestamp)
                .unwrap_or_else(|| Scalar::Unparseable(cell.to_string()));
        }

        if cell.starts_with("n:") {
            return self
                .number
                .captures(cell)
                .and_then(|caps| caps[1].parse::<f64>().ok())
                .map(Scalar::Number)
                .unwrap_or_else(|| Scalar::Unparseable(cell.to_string()));
        }

        Scalar::Text(cell.to_string())
    }

    /// Parse a JSON cell; only strings carry typed scalars
    ///
    /// `null` is `None`; other JSON kinds are `Unparseable`.
    pub fn parse_value(&self, value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(self.parse(s)),
            other => Some(Scalar::Unparseable(other.to_string())),
        }
    }
}
