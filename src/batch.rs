//! Contiguous partitioning of identifier lists

use crate::error::{Result, RetrievalError};

/// One bounded, non-empty slice of the caller's identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    items: Vec<String>,
}

impl Batch {
    /// Position of this batch in the partition
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items joined with `sep`, the form batched upstream calls expect
    pub fn join(&self, sep: &str) -> String {
        self.items.join(sep)
    }
}

/// Split `items` into `ceil(N / size)` contiguous batches of at most `size`
///
/// Only the last batch may be short. An empty input yields no batches.
pub fn partition<S: AsRef<str>>(items: &[S], size: usize) -> Result<Vec<Batch>> {
    if size == 0 {
        return Err(RetrievalError::configuration(
            "batch size must be a positive integer",
        ));
    }

    Ok(items
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            index,
            items: chunk.iter().map(|s| s.as_ref().to_string()).collect(),
        })
        .collect())
}
