//! In-memory result tables
//!
//! - `MetadataTable`: flattened JSON records, values kept as-is
//! - `TimeSeriesTable`: timestamp index plus numeric columns

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;

/// Flattened table over JSON records
///
/// One row per record. Nested objects become `parent.child` columns.
/// Columns appear in the order they are first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
}

impl MetadataTable {
    /// Flatten a sequence of JSON objects
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut flat_rows = Vec::new();

        for record in records {
            let mut flat = Vec::new();
            flatten_into("", record, &mut flat);

            for (key, _) in &flat {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
            flat_rows.push(flat);
        }

        let rows = flat_rows
            .into_iter()
            .map(|flat| {
                let mut row = vec![None; columns.len()];
                for (key, value) in flat {
                    row[positions[&key]] = Some(value);
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row` in `column`
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_ref()
    }

    /// All cells of one column, `None` where a record lacked the key
    pub fn column(&self, column: &str) -> Option<Vec<Option<&Value>>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(|row| row[col].as_ref()).collect())
    }

    /// Value of `target` in the first row whose `key` column equals `value`
    pub fn lookup(&self, key: &str, value: &str, target: &str) -> Option<&Value> {
        let key_col = self.column_index(key)?;
        let target_col = self.column_index(target)?;

        self.rows
            .iter()
            .find(|row| matches!(&row[key_col], Some(Value::String(s)) if s == value))
            .and_then(|row| row[target_col].as_ref())
    }

    /// Write as CSV with a header row; strings unquoted, other values as JSON
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;

        for row in &self.rows {
            wtr.write_record(row.iter().map(|cell| match cell {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            }))?;
        }

        wtr.flush()?;
        Ok(())
    }
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_into(&name, nested, out),
            other => out.push((name, other.clone())),
        }
    }
}

/// Numeric table indexed by timestamp
///
/// Every column has exactly one cell per index entry; `None` marks a missing
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesTable {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl TimeSeriesTable {
    /// An empty table over the given index
    pub fn new(index: Vec<NaiveDateTime>) -> Self {
        Self {
            index,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Add a column; its length must match the index
    pub(crate) fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.index.len());
        self.columns.push(name.into());
        self.values.push(values);
    }

    pub(crate) fn rename_column(&mut self, position: usize, name: impl Into<String>) {
        if let Some(column) = self.columns.get_mut(position) {
            *column = name.into();
        }
    }

    /// Stable sort of all rows by timestamp
    pub(crate) fn sort_by_index(&mut self) {
        if self.index.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }

        let mut order: Vec<usize> = (0..self.index.len()).collect();
        order.sort_by_key(|&i| self.index[i]);

        self.index = order.iter().map(|&i| self.index[i]).collect();
        for column in &mut self.values {
            *column = order.iter().map(|&i| column[i]).collect();
        }
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        let col = self.columns.iter().position(|c| c == name)?;
        Some(&self.values[col])
    }

    /// Value at `row` in column `name`; `None` when missing or out of range
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name)?.get(row).copied().flatten()
    }

    /// Count of missing cells across all columns
    pub fn missing_count(&self) -> usize {
        self.values
            .iter()
            .map(|column| column.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Iterate rows as (timestamp, values in column order)
    pub fn rows(&self) -> impl Iterator<Item = (NaiveDateTime, Vec<Option<f64>>)> + '_ {
        self.index
            .iter()
            .enumerate()
            .map(move |(i, ts)| (*ts, self.values.iter().map(|col| col[i]).collect()))
    }

    /// Write as CSV: `ts` then one column per series, missing as empty
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push("ts".to_string());
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;

        for (ts, values) in self.rows() {
            let mut record = Vec::with_capacity(values.len() + 1);
            record.push(ts.format("%Y-%m-%dT%H:%M:%S").to_string());
            record.extend(
                values
                    .into_iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}
