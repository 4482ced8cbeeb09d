use thiserror::Error;

/// Errors coming from the warehouse connection layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection could not be established.
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A statement failed to execute.
    #[error("Query failed: {0}")]
    Query(String),

    /// Any PostgreSQL-protocol driver error.
    #[error("Driver error: {0}")]
    Driver(#[from] tokio_postgres::Error),

    /// The connection was used after `close`.
    #[error("Connection is closed")]
    Closed,
}

/// Errors raised by an open load stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to write chunk to load stream: {0}")]
    Write(String),

    #[error("Failed to finalize load stream: {0}")]
    Finish(String),

    #[error("Load stream is no longer open")]
    Closed,
}

/// Errors raised while turning a batch into load-format bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Row {row} has {actual} values but {expected} columns are loaded")]
    ColumnCount {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("CSV payload column must be a string, found {0}")]
    InvalidPayload(String),
}

/// Errors raised while preparing the target table definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DdlError {
    #[error("Cannot load column '{column}' of type {logical_type}")]
    NotSupportedType {
        column: String,
        logical_type: String,
    },
}
