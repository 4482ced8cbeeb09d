use crate::{
    error::{DbError, StreamError},
    params::ConnectionParams,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt, str::FromStr};

/// How the warehouse should place the loaded rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    Auto,
    #[default]
    Direct,
    Trickle,
}

impl CopyMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CopyMode::Auto => "AUTO",
            CopyMode::Direct => "DIRECT",
            CopyMode::Trickle => "TRICKLE",
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for CopyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(CopyMode::Auto),
            "DIRECT" => Ok(CopyMode::Direct),
            "TRICKLE" => Ok(CopyMode::Trickle),
            other => Err(format!("unknown copy mode '{other}'")),
        }
    }
}

/// Describes the streaming load a worker opens against the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub delimiter: char,
    pub copy_mode: CopyMode,
    /// Reject the whole stream on the first bad row instead of skipping it.
    pub abort_on_error: bool,
}

/// Text result of an ad-hoc query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    /// Renders each row as `column=value` pairs for logging.
    pub fn render_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, val)| format!("{col}={}", val.as_deref().unwrap_or("NULL")))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }
}

/// Opens sessions against the warehouse.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn WarehouseConnection>, DbError>;
}

/// One warehouse session.
#[async_trait]
pub trait WarehouseConnection: Send {
    async fn query(&mut self, sql: &str) -> Result<QueryResult, DbError>;

    /// Starts a streaming load (COPY FROM STDIN) on this session.
    async fn begin_load(&mut self, request: &LoadRequest) -> Result<Box<dyn LoadStream>, DbError>;

    async fn close(&mut self) -> Result<(), DbError>;
}

/// An in-flight streaming load.
///
/// Exactly one of `finish` or `discard` takes effect; calls after that are
/// no-ops or return [`StreamError::Closed`].
#[async_trait]
pub trait LoadStream: Send {
    /// Writes one chunk carrying `rows` rows and returns how many rows the
    /// warehouse acknowledged for it.
    async fn write(&mut self, chunk: Bytes, rows: u64) -> Result<u64, StreamError>;

    /// Ends the load and commits it. Returns the number of rows committed.
    async fn finish(&mut self) -> Result<u64, StreamError>;

    /// Tears the load down without committing anything.
    async fn discard(&mut self) -> Result<(), StreamError>;

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_mode_parses_case_insensitively() {
        assert_eq!("trickle".parse::<CopyMode>(), Ok(CopyMode::Trickle));
        assert_eq!(" Auto".parse::<CopyMode>(), Ok(CopyMode::Auto));
        assert!("BULK".parse::<CopyMode>().is_err());
        assert_eq!(CopyMode::default(), CopyMode::Direct);
    }

    #[test]
    fn query_result_helpers() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![Some("1".into()), None]],
        };
        assert_eq!(result.scalar(), Some("1"));
        assert_eq!(result.render_rows(), vec!["id=1, name=NULL".to_string()]);
    }
}
