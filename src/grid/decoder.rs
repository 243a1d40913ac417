//! Grid decoding
//!
//! Turns a successful response body into the result the caller asked for.
//! Cell-level problems never fail a decode: a cell that isn't a number
//! becomes a missing value, a column without an `id` keeps its display
//! name. Only a grid with no usable timestamp index produces an absent
//! time series, and only a body that isn't JSON at all is an error.

use super::{
    scalar::{Scalar, ScalarParser},
    Grid, GridColumn, GridError, MetadataTable, ResultFormat, ResultShape, TimeSeriesTable,
};
use std::collections::{BTreeSet, HashSet};

/// Name of the index column when the grid declares no columns
const DEFAULT_INDEX_COLUMN: &str = "ts";

/// Decoded response
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Repaired CSV text
    Csv(String),
    /// Zinc text, undecoded
    Zinc(String),
    /// Flattened rows
    Metadata(MetadataTable),
    /// Series table, absent when the grid has no timestamp index
    TimeSeries(Option<TimeSeriesTable>),
    /// Column metadata and series table, absent as above
    Both(Option<(MetadataTable, TimeSeriesTable)>),
}

/// Fix the two byte sequences the server's CSV encoder is known to mangle
///
/// A UTF-8 checkmark read as Latin-1 becomes `True`; stray `Â` artifacts
/// are dropped. Nothing else is touched.
pub fn repair_csv(text: &str) -> String {
    text.replace("\u{e2}\u{9c}\u{93}", "True")
        .replace('\u{2713}', "True")
        .replace('\u{c2}', "")
}

/// Grid decoder
#[derive(Debug, Clone)]
pub struct GridDecoder {
    scalars: ScalarParser,
}

impl GridDecoder {
    pub fn new() -> Result<Self, GridError> {
        Ok(Self {
            scalars: ScalarParser::new()?,
        })
    }

    /// The scalar parser used for cells
    pub fn scalars(&self) -> &ScalarParser {
        &self.scalars
    }

    /// Decode a response body according to its format and the requested shape
    ///
    /// `shape` only matters for JSON.
    pub fn decode(
        &self,
        body: &str,
        format: ResultFormat,
        shape: ResultShape,
    ) -> Result<Decoded, GridError> {
        match format {
            ResultFormat::Csv => Ok(Decoded::Csv(repair_csv(body))),
            ResultFormat::Zinc => Ok(Decoded::Zinc(body.to_string())),
            ResultFormat::Json => {
                let grid = Grid::from_json(body)?;
                Ok(match shape {
                    ResultShape::Meta => Decoded::Metadata(self.decode_metadata(&grid)),
                    ResultShape::Ts => {
                        Decoded::TimeSeries(self.decode_time_series(&grid).map(|(_, ts)| ts))
                    }
                    ResultShape::Both => Decoded::Both(self.decode_time_series(&grid)),
                })
            }
        }
    }

    /// Flatten `grid.rows`, no coercion
    pub fn decode_metadata(&self, grid: &Grid) -> MetadataTable {
        MetadataTable::from_records(&grid.rows)
    }

    /// Decode a history grid into column metadata and a series table
    ///
    /// The first column is the timestamp index. Rows whose index cell isn't
    /// a timestamp are dropped; if none is, the result is `None`. Value
    /// columns are renamed from their display name to the column `id`.
    pub fn decode_time_series(&self, grid: &Grid) -> Option<(MetadataTable, TimeSeriesTable)> {
        let col_records: Vec<_> = grid.cols.iter().skip(1).map(GridColumn::to_record).collect();
        let column_meta = MetadataTable::from_records(&col_records);

        let index_key = grid
            .cols
            .first()
            .map(|c| c.name.as_str())
            .unwrap_or(DEFAULT_INDEX_COLUMN);

        // Rows that carry a usable timestamp, with that timestamp
        let indexed: Vec<_> = grid
            .rows
            .iter()
            .filter_map(|row| {
                row.get(index_key)
                    .and_then(|cell| self.scalars.parse_value(cell))
                    .and_then(|scalar| scalar.as_timestamp())
                    .map(|ts| (ts, row))
            })
            .collect();

        if indexed.is_empty() {
            tracing::warn!(
                index_column = index_key,
                rows = grid.rows.len(),
                "Grid has no timestamp index, no time series decoded"
            );
            return None;
        }

        let dropped = grid.rows.len() - indexed.len();
        if dropped > 0 {
            tracing::warn!(
                index_column = index_key,
                dropped,
                "Dropped rows without a timestamp index"
            );
        }

        let mut table = TimeSeriesTable::new(indexed.iter().map(|(ts, _)| *ts).collect());

        for name in value_column_names(grid, index_key) {
            let values = indexed
                .iter()
                .map(|(_, row)| {
                    row.get(&name)
                        .and_then(|cell| self.scalars.parse_value(cell))
                        .as_ref()
                        .and_then(Scalar::as_number)
                })
                .collect();
            table.push_column(name, values);
        }

        let names: Vec<String> = table.column_names().to_vec();
        for (position, name) in names.iter().enumerate() {
            match column_meta
                .lookup("name", name, "id")
                .and_then(|id| id.as_str())
            {
                Some(id) => table.rename_column(position, id),
                None => tracing::warn!(column = %name, "No column id, keeping display name"),
            }
        }

        table.sort_by_index();
        Some((column_meta, table))
    }
}

/// Value columns: declared columns after the index, then undeclared row keys
fn value_column_names(grid: &Grid, index_key: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(index_key);

    for col in grid.cols.iter().skip(1) {
        if seen.insert(col.name.as_str()) {
            names.push(col.name.clone());
        }
    }

    let extra: BTreeSet<&str> = grid
        .rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .filter(|key| !seen.contains(key))
        .collect();
    names.extend(extra.into_iter().map(str::to_string));

    names
}
