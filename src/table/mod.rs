//! In-memory tabular dataset.
//!
//! A [`Table`] is an ordered list of rows over a fixed set of named
//! columns. Tables are loaded from delimited text files with a header row;
//! every field starts out as text and individual columns can be coerced to
//! numbers afterwards.

use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while loading or reshaping a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to read CSV data from {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

/// Largest magnitude below which every integral `f64` is exact (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
    Missing,
}

impl Value {
    /// Build a value from a raw CSV field. Empty fields are missing.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Value::Missing
        } else {
            Value::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    #[allow(dead_code)] // Accessor for numeric consumers
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::Missing => Ok(()),
        }
    }
}

/// One table row. Cells are stored positionally, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Value>,
}

impl Row {
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    /// The cell at a column position; out-of-range positions read as missing.
    pub fn get(&self, index: usize) -> &Value {
        self.cells.get(index).unwrap_or(&Value::Missing)
    }
}

/// Kind of data held by a column, used when describing the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
    Empty,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Empty => write!(f, "empty"),
        }
    }
}

/// Ordered rows over named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from column names and rows of raw string fields.
    ///
    /// Short rows are padded with missing values; extra fields are dropped.
    #[allow(dead_code)] // Used to build small tables in tests
    pub fn from_records<S: AsRef<str>>(columns: &[S], records: &[Vec<S>]) -> Self {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = records
            .iter()
            .map(|record| {
                let mut cells: Vec<Value> = record
                    .iter()
                    .take(columns.len())
                    .map(|f| Value::from_field(f.as_ref()))
                    .collect();
                cells.resize(columns.len(), Value::Missing);
                Row::new(cells)
            })
            .collect();

        Self { columns, rows }
    }

    /// Load a table from a CSV file with a header row.
    pub fn load_csv(path: &Path) -> Result<Self, TableError> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| TableError::Csv {
                path: path.display().to_string(),
                source,
            })?;

        let table = Self::read_from(reader, &path.display().to_string())?;
        info!(
            "Loaded {} rows, {} columns from {}",
            table.row_count(),
            table.column_count(),
            path.display()
        );
        Ok(table)
    }

    /// Load a table from any CSV reader (used for in-memory data).
    #[allow(dead_code)]
    pub fn from_reader<R: Read>(input: R) -> Result<Self, TableError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
        Self::read_from(reader, "<memory>")
    }

    fn read_from<R: Read>(mut reader: csv::Reader<R>, origin: &str) -> Result<Self, TableError> {
        let csv_err = |source| TableError::Csv {
            path: origin.to_string(),
            source,
        };

        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let mut cells: Vec<Value> = record
                .iter()
                .take(columns.len())
                .map(Value::from_field)
                .collect();
            if cells.len() < columns.len() {
                debug!(
                    "Row {} has {} fields, padding to {}",
                    rows.len() + 1,
                    cells.len(),
                    columns.len()
                );
                cells.resize(columns.len(), Value::Missing);
            }
            rows.push(Row::new(cells));
        }

        Ok(Self { columns, rows })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the values of one column in row order.
    #[allow(dead_code)]
    pub fn column_values(&self, name: &str) -> Result<impl Iterator<Item = &Value>, TableError> {
        let index = self
            .column_index(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        Ok(self.rows.iter().map(move |row| row.get(index)))
    }

    /// Convert a column to numbers. Values that do not parse, or parse to
    /// NaN or infinity, become missing.
    ///
    /// Returns the number of non-missing values that failed to parse.
    pub fn coerce_numeric(&mut self, name: &str) -> Result<usize, TableError> {
        let index = self
            .column_index(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;

        let mut rejected = 0;
        for row in &mut self.rows {
            let Some(cell) = row.cells.get_mut(index) else {
                continue;
            };
            if let Value::Text(s) = &*cell {
                let parsed = s.trim().parse::<f64>();
                *cell = match parsed {
                    Ok(n) if n.is_finite() => Value::Number(n),
                    _ => {
                        rejected += 1;
                        Value::Missing
                    }
                };
            }
        }

        if rejected > 0 {
            warn!("{} values in column '{}' were not numeric", rejected, name);
        }
        Ok(rejected)
    }

    /// Infer a column's kind from its values.
    pub fn column_kind(&self, index: usize) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for row in &self.rows {
            match row.get(index) {
                Value::Text(_) => return ColumnKind::Text,
                Value::Number(_) => kind = ColumnKind::Numeric,
                Value::Missing => {}
            }
        }
        kind
    }

    /// Number of missing cells in a column.
    pub fn missing_count(&self, index: usize) -> usize {
        self.rows.iter().filter(|r| r.get(index).is_missing()).count()
    }

    /// Plain-text description of the table for a language model: shape,
    /// column kinds with missing counts, and the first `sample_rows` rows
    /// rendered as CSV.
    pub fn describe(&self, sample_rows: usize) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "The table has {} rows and {} columns.\n\n",
            self.row_count(),
            self.column_count()
        ));

        out.push_str("Columns:\n");
        for (i, name) in self.columns.iter().enumerate() {
            out.push_str(&format!(
                "- {} ({}, {} missing)\n",
                name,
                self.column_kind(i),
                self.missing_count(i)
            ));
        }

        if sample_rows > 0 && !self.rows.is_empty() {
            out.push_str(&format!(
                "\nFirst {} rows (CSV):\n",
                sample_rows.min(self.rows.len())
            ));
            match self.sample_csv(sample_rows) {
                Ok(sample) => out.push_str(&sample),
                Err(e) => warn!("Could not render sample rows: {}", e),
            }
        }

        out
    }

    /// The header and first `limit` rows as CSV text.
    fn sample_csv(&self, limit: usize) -> Result<String, csv::Error> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in self.rows.iter().take(limit) {
            writer.write_record(row.cells.iter().map(|v| v.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
