use crate::core::value::Value;

pub type Row = Vec<Value>;

/// An immutable chunk of rows produced by one upstream partition.
///
/// Ownership moves into the worker queue on a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub partition_index: usize,
    pub rows: Vec<Row>,
}

impl RecordBatch {
    pub fn new(partition_index: usize, rows: Vec<Row>) -> Self {
        Self {
            partition_index,
            rows,
        }
    }

    pub fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().map(Value::size_bytes).sum::<usize>())
            .sum()
    }
}
