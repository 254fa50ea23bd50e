//! Result tables and their assembly from per-batch outcomes

use serde::Serialize;
use tracing::{info, warn};

/// Rows of one record type plus the columns they populate
///
/// Rows are typed structs, so a column missing from one batch is simply
/// `None` in that batch's rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table<R> {
    columns: Vec<&'static str>,
    rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(columns: Vec<&'static str>, rows: Vec<R>) -> Self {
        Self { columns, rows }
    }

    /// A table with the given columns and no rows
    pub fn empty(columns: Vec<&'static str>) -> Self {
        Self::new(columns, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| *c == name)
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// Consume the table and keep only rows matching `keep`
    pub(crate) fn retain(mut self, keep: impl FnMut(&R) -> bool) -> Self {
        self.rows.retain(keep);
        self
    }

    pub(crate) fn sort_by(mut self, compare: impl FnMut(&R, &R) -> std::cmp::Ordering) -> Self {
        self.rows.sort_by(compare);
        self
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [R] {
        &mut self.rows
    }

    /// Append `other`, widening the column set to the union
    fn extend(&mut self, other: Table<R>) {
        for column in other.columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(other.rows);
    }
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl<R> IntoIterator for Table<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Result of applying an adapter to one batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome<R> {
    Fetched(Table<R>),
    Unavailable { reason: String },
}

impl<R> BatchOutcome<R> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        BatchOutcome::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, BatchOutcome::Fetched(_))
    }

    pub fn table(&self) -> Option<&Table<R>> {
        match self {
            BatchOutcome::Fetched(table) => Some(table),
            BatchOutcome::Unavailable { .. } => None,
        }
    }
}

/// Concatenate fetched batches in order, skipping unavailable ones
///
/// Returns an empty table when every batch failed.
pub fn assemble<R>(outcomes: Vec<BatchOutcome<R>>) -> Table<R> {
    let total = outcomes.len();
    let mut table = Table::default();
    let mut unavailable = 0usize;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            BatchOutcome::Fetched(batch_table) => table.extend(batch_table),
            BatchOutcome::Unavailable { reason } => {
                unavailable += 1;
                warn!(batch = index, reason = %reason, "Skipping unavailable batch");
            }
        }
    }

    if unavailable > 0 {
        warn!(
            unavailable,
            total,
            rows = table.len(),
            "Assembled result with unavailable batches"
        );
    } else {
        info!(batches = total, rows = table.len(), "Assembled result");
    }

    table
}
