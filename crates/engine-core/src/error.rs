use connectors::error::DdlError;
use model::report::TransactionReport;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Which blocking point ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Enqueue,
    Dequeue,
    Write,
    Finish,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutKind::Enqueue => "enqueue",
            TimeoutKind::Dequeue => "dequeue",
            TimeoutKind::Write => "write",
            TimeoutKind::Finish => "finish",
        };
        f.write_str(s)
    }
}

/// Failure taxonomy of a load transaction.
///
/// Cloneable so the first fatal error can be handed to every producer that
/// was blocked when the pool aborted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cannot reach warehouse: {0}")]
    Connectivity(String),

    #[error("Worker {worker}: {kind} timed out after {}ms", .after.as_millis())]
    Timeout {
        kind: TimeoutKind,
        worker: usize,
        after: Duration,
    },

    #[error("Worker {worker}: load stream failed: {message}")]
    StreamFailure { worker: usize, message: String },

    #[error(
        "ABORT: `num_input_rows ({})` and `num_output_rows ({})` does not match",
        .report.num_input_rows,
        .report.num_output_rows
    )]
    Reconciliation { report: TransactionReport },

    #[error("Unsupported column type: {0}")]
    NotSupportedType(String),

    #[error("Load aborted: {0}")]
    Aborted(String),

    #[error("Invalid pool state: {0}")]
    InvalidState(String),
}

impl LoadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoadError::Timeout { .. })
    }

    /// The worker the error originated from, when it has one.
    pub fn worker(&self) -> Option<usize> {
        match self {
            LoadError::Timeout { worker, .. } | LoadError::StreamFailure { worker, .. } => {
                Some(*worker)
            }
            _ => None,
        }
    }
}

impl From<DdlError> for LoadError {
    fn from(err: DdlError) -> Self {
        LoadError::NotSupportedType(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = LoadError::Timeout {
            kind: TimeoutKind::Write,
            worker: 2,
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "Worker 2: write timed out after 1500ms");
        assert_eq!(err.worker(), Some(2));
        assert!(err.is_timeout());

        let report = TransactionReport {
            num_input_rows: 100,
            num_total_rows: 100,
            num_output_rows: 98,
            num_rejected_rows: 2,
        };
        assert_eq!(
            LoadError::Reconciliation { report }.to_string(),
            "ABORT: `num_input_rows (100)` and `num_output_rows (98)` does not match"
        );
    }
}
