//! Grid Decoding
//!
//! The server answers every eval request with a grid: column descriptors
//! plus rows of typed scalar cells. This module turns a grid into tables.
//!
//! - **Scalar**: typed cell parser (`t:` timestamps, `n:` numbers, text)
//! - **Tables**: `MetadataTable` (flattened records) and `TimeSeriesTable`
//!   (timestamp index, numeric columns keyed by column id)
//! - **Decoder**: picks the decoding for a wire format and result shape
//!
//! ## Wire formats
//!
//! | Format | Accept header        | Decoding                    |
//! |--------|----------------------|-----------------------------|
//! | json   | `application/json`   | grid → tables               |
//! | csv    | `text/csv`           | text with encoding repairs  |
//! | zinc   | `text/zinc`          | raw text                    |

mod decoder;
mod scalar;
mod table;

pub use decoder::{repair_csv, Decoded, GridDecoder};
pub use scalar::{Scalar, ScalarParser};
pub use table::{MetadataTable, TimeSeriesTable};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// A JSON grid
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Grid {
    /// Grid-level meta (`ver`, `hisStart`, ...)
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Column descriptors; the first one names the index column
    #[serde(default)]
    pub cols: Vec<GridColumn>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

impl Grid {
    pub fn from_json(body: &str) -> Result<Self, GridError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// One column descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridColumn {
    /// Display name, also the key used in rows
    pub name: String,
    /// Stable identity of the series behind the column; a non-string `id`
    /// is treated as absent
    #[serde(
        default,
        deserialize_with = "string_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Any other column meta (`dis`, `unit`, `kind`, ...)
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl GridColumn {
    /// The descriptor as one JSON record
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(id) = &self.id {
            record.insert("id".to_string(), Value::String(id.clone()));
        }
        for (key, value) in &self.meta {
            record.insert(key.clone(), value.clone());
        }
        record
    }
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Wire format requested through the `accept` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
    #[default]
    Json,
    Csv,
    Zinc,
}

impl ResultFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ResultFormat::Json => "application/json",
            ResultFormat::Csv => "text/csv",
            ResultFormat::Zinc => "text/zinc",
        }
    }
}

impl std::fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for ResultFormat {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" | "application/json" => Ok(ResultFormat::Json),
            "csv" | "text/csv" => Ok(ResultFormat::Csv),
            "zinc" | "text/zinc" => Ok(ResultFormat::Zinc),
            _ => Err(GridError::UnknownFormat(s.to_string())),
        }
    }
}

/// Shape of a decoded JSON result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    /// Rows as a metadata table
    #[default]
    Meta,
    /// Timestamp-indexed series table
    Ts,
    /// Column metadata plus series table
    Both,
}

impl FromStr for ResultShape {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meta" => Ok(ResultShape::Meta),
            "ts" => Ok(ResultShape::Ts),
            "both" => Ok(ResultShape::Both),
            _ => Err(GridError::UnknownShape(s.to_string())),
        }
    }
}

/// Errors raised while decoding a response body
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Invalid JSON grid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scalar pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Unknown result format: {0}")]
    UnknownFormat(String),

    #[error("Unknown result shape: {0}")]
    UnknownShape(String),
}
