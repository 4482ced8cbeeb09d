use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Record {record} has {actual} fields, expected {expected}")]
    FieldCount {
        record: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Record {record}, column '{column}': cannot parse '{raw}' as {expected}")]
    InvalidValue {
        record: u64,
        column: String,
        raw: String,
        expected: String,
    },
}
