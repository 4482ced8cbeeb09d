use crate::settings::error::ConfigError;
use connectors::ddl::ColumnOption;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};

/// Raw, unvalidated task options as they appear in the job file.
///
/// Keys follow snake_case; the camelCase spellings are accepted as aliases.
/// Timeouts are expressed in seconds.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Older spelling of `user`.
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub mode: Option<String>,
    #[serde(alias = "copyMode")]
    pub copy_mode: Option<String>,
    #[serde(alias = "abortOnError")]
    pub abort_on_error: Option<bool>,
    #[serde(alias = "delimiter_str")]
    pub delimiter: Option<String>,
    #[serde(alias = "pool_size", alias = "poolSize")]
    pub pool: Option<usize>,
    #[serde(alias = "queueCapacity")]
    pub queue_capacity: Option<usize>,
    #[serde(alias = "enqueueTimeout")]
    pub enqueue_timeout: Option<f64>,
    #[serde(alias = "writeTimeout")]
    pub write_timeout: Option<f64>,
    #[serde(alias = "dequeueTimeout")]
    pub dequeue_timeout: Option<f64>,
    #[serde(alias = "finishTimeout")]
    pub finish_timeout: Option<f64>,
    #[serde(alias = "columnOptions")]
    pub column_options: BTreeMap<String, ColumnOption>,
    #[serde(alias = "resourcePool")]
    pub resource_pool: Option<String>,
    #[serde(alias = "loadTimeCol")]
    pub load_time_col: Option<String>,
    #[serde(alias = "defaultTimezone")]
    pub default_timezone: Option<String>,
    #[serde(alias = "csvPayload")]
    pub csv_payload: Option<bool>,
    /// Only meaningful for JSON-parsed loads; accepted and ignored.
    #[serde(alias = "rejectOnMaterializedTypeError")]
    pub reject_on_materialized_type_error: Option<bool>,
}

impl TaskOptions {
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }
}
