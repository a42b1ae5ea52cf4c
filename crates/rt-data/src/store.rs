//! Row store - the last successfully decoded row set

use std::sync::Arc;

use rt_core::{RequestId, Row};

/// Holds the rows of the most recent applied decode.
///
/// The rows are only ever replaced as a whole, so a failed or superseded
/// decode leaves the previous rows in place.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: Arc<Vec<Row>>,
    source: Option<RequestId>,
    generation: u64,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Shared handle to the current rows, cheap to clone
    pub fn snapshot(&self) -> Arc<Vec<Row>> {
        self.rows.clone()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Request whose payload produced the current rows
    pub fn source(&self) -> Option<RequestId> {
        self.source
    }

    /// Incremented on every replacement
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn replace(&mut self, rows: Vec<Row>, source: RequestId) {
        self.rows = Arc::new(rows);
        self.source = Some(source);
        self.generation += 1;
    }
}
