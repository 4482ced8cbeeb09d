use crate::error::CliError;
use engine_config::settings::TaskOptions;
use model::core::schema::Schema;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_BATCH_SIZE: usize = 1000;

/// A job file: the task options plus what the CLI needs to read its inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    #[serde(flatten)]
    pub options: TaskOptions,
    /// Declared column names and logical types of the input files.
    pub columns: Schema,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_has_headers() -> bool {
    true
}

impl JobFile {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let source = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::data_type::LogicalType;
    use std::io::Write;

    #[tokio::test]
    async fn reads_options_and_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "user": "dbadmin",
                "table": "events",
                "copyMode": "trickle",
                "pool": 2,
                "columns": [
                    {{"name": "id", "type": "long"}},
                    {{"name": "at", "type": "timestamp"}}
                ],
                "batch_size": 50
            }}"#
        )
        .unwrap();

        let job = JobFile::load(file.path()).await.unwrap();
        assert_eq!(job.options.user.as_deref(), Some("dbadmin"));
        assert_eq!(job.options.copy_mode.as_deref(), Some("trickle"));
        assert_eq!(job.options.pool, Some(2));
        assert_eq!(job.columns.len(), 2);
        assert_eq!(
            job.columns.column("at").map(|c| c.logical_type),
            Some(LogicalType::Timestamp)
        );
        assert_eq!(job.batch_size, 50);
        assert!(job.has_headers);
    }
}
