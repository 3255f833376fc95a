//! Top-N category aggregation over multi-value columns.
//!
//! A multi-value cell holds several category tokens joined by a separator
//! (for example `"United States, India"`). The aggregator splits every
//! cell of one column, flattens the tokens across rows, counts each
//! distinct token and keeps the N most frequent ones.

use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Default token separator inside a multi-value cell.
pub const DEFAULT_SEPARATOR: &str = ", ";

/// Default number of categories kept.
pub const DEFAULT_TOP_N: usize = 10;

/// Errors raised by the aggregator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Column '{0}' contains no category values")]
    EmptyInput(String),

    #[error("Top-N limit must be at least 1")]
    InvalidTopN,
}

/// Count of one category token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub token: String,
    pub count: usize,
}

/// Occurrences per distinct token, in first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<CategoryCount>,
    index: HashMap<String, usize>,
    total: usize,
}

impl FrequencyTable {
    fn record(&mut self, token: &str) {
        match self.index.get(token) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(token.to_string(), self.entries.len());
                self.entries.push(CategoryCount {
                    token: token.to_string(),
                    count: 1,
                });
            }
        }
        self.total += 1;
    }

    /// Count for a token, if it was seen.
    pub fn get(&self, token: &str) -> Option<usize> {
        self.index.get(token).map(|&i| self.entries[i].count)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total token occurrences across all rows.
    pub fn total(&self) -> usize {
        self.total
    }

    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = &CategoryCount> {
        self.entries.iter()
    }

    /// The `n` most frequent tokens, count descending. Ties keep
    /// first-encountered order.
    pub fn top(&self, n: usize) -> TopNResult {
        let mut entries = self.entries.clone();
        // sort_by is stable
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries.truncate(n);
        TopNResult { entries }
    }
}

/// The N highest-count tokens, ordered by count descending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopNResult {
    pub entries: Vec<CategoryCount>,
}

impl TopNResult {
    /// Sum of the displayed counts.
    #[allow(dead_code)]
    pub fn displayed_total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.token.clone()).collect()
    }
}

/// Splits, counts and ranks the tokens of one multi-value column.
#[derive(Debug, Clone)]
pub struct TopCategoryAggregator {
    column: String,
    separator: String,
    top_n: usize,
    trim_tokens: bool,
}

impl TopCategoryAggregator {
    /// Aggregator over `column` with the default separator and limit.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
            top_n: DEFAULT_TOP_N,
            trim_tokens: false,
        }
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    /// Trim surrounding whitespace from each token before counting.
    pub fn trim_tokens(mut self, trim: bool) -> Self {
        self.trim_tokens = trim;
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Split one cell into its non-empty tokens.
    fn tokens<'a>(&'a self, cell: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let split: Box<dyn Iterator<Item = &'a str> + 'a> = if self.separator.is_empty() {
            Box::new(std::iter::once(cell))
        } else {
            Box::new(cell.split(self.separator.as_str()))
        };

        split
            .map(move |t| if self.trim_tokens { t.trim() } else { t })
            .filter(|t| !t.is_empty())
    }

    /// Build the full frequency table for the column.
    ///
    /// A column holding only missing or empty values yields an empty table.
    pub fn frequency_table(&self, table: &Table) -> Result<FrequencyTable, AggregateError> {
        let index = table
            .column_index(&self.column)
            .ok_or_else(|| AggregateError::ColumnNotFound(self.column.clone()))?;

        let mut freq = FrequencyTable::default();
        for row in table.rows() {
            let cell = match row.get(index) {
                Value::Missing => continue,
                Value::Text(s) => s.clone(),
                other => other.to_string(),
            };
            for token in self.tokens(&cell) {
                freq.record(token);
            }
        }

        debug!(
            "Column '{}': {} tokens, {} distinct",
            self.column,
            freq.total(),
            freq.len()
        );
        Ok(freq)
    }

    /// Compute the top-N categories for the column.
    pub fn aggregate(&self, table: &Table) -> Result<TopNResult, AggregateError> {
        if self.top_n == 0 {
            return Err(AggregateError::InvalidTopN);
        }

        let freq = self.frequency_table(table)?;
        if freq.is_empty() {
            return Err(AggregateError::EmptyInput(self.column.clone()));
        }

        Ok(freq.top(self.top_n))
    }
}
