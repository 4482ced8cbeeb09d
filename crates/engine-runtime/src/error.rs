use engine_config::settings::ConfigError;
use engine_core::error::LoadError;
use model::report::{TransactionReport, WorkerReport};
use thiserror::Error;

/// A failed transaction, with whatever the pool managed to report.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct TransactionError {
    #[source]
    pub source: LoadError,
    /// Reports of every worker that was started, in worker order.
    pub worker_reports: Vec<WorkerReport>,
    /// Set once the pool committed and the target table was counted.
    pub report: Option<TransactionReport>,
}

impl TransactionError {
    pub fn new(source: LoadError, worker_reports: Vec<WorkerReport>) -> Self {
        Self {
            source,
            worker_reports,
            report: None,
        }
    }

    pub fn kind(&self) -> &LoadError {
        &self.source
    }
}

impl From<LoadError> for TransactionError {
    fn from(source: LoadError) -> Self {
        Self::new(source, Vec::new())
    }
}

impl From<ConfigError> for TransactionError {
    fn from(err: ConfigError) -> Self {
        LoadError::Configuration(err.to_string()).into()
    }
}
