use connectors::error::{DbError, DdlError};
use engine_config::settings::ConfigError;
use engine_core::error::LoadError;
use engine_runtime::error::TransactionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read the job file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error("Failed to parse the job file: {0}")]
    ConfigDeserialize(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported column type: {0}")]
    Ddl(#[from] DdlError),

    #[error("Warehouse error: {0}")]
    Database(#[from] DbError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Load transaction failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
