use crate::settings::{error::ConfigError, mode::LoadMode, options::TaskOptions};
use chrono_tz::Tz;
use connectors::{
    ddl::ColumnOption,
    params::ConnectionParams,
    quote::qualified_table,
    warehouse::{CopyMode, LoadRequest},
};
use model::core::schema::Schema;
use std::{collections::BTreeMap, time::Duration};
use tracing::warn;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5433;
const DEFAULT_DATABASE: &str = "vdb";
const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_DELIMITER: char = '|';
const DEFAULT_QUEUE_CAPACITY: usize = 1;

/// Deadlines of the pool's blocking points. `None` waits forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    /// How long `dispatch` may block on a full worker queue.
    pub enqueue: Option<Duration>,
    /// How long a single chunk write to a load stream may take.
    pub write: Option<Duration>,
    /// How long a running worker may wait for its next batch.
    pub dequeue: Option<Duration>,
    /// How long each worker may take to drain and finalize on commit.
    pub finish: Option<Duration>,
}

/// Immutable, validated configuration shared by every worker of a transaction.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub connection: ConnectionParams,
    pub schema: String,
    pub table: String,
    pub mode: LoadMode,
    pub copy_mode: CopyMode,
    /// Fail the job when verified and input row counts differ. Also adds
    /// `ABORT ON ERROR` to the COPY statement.
    pub abort_on_error: bool,
    pub delimiter: char,
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub timeouts: Timeouts,
    pub column_options: BTreeMap<String, ColumnOption>,
    pub load_time_col: Option<String>,
    pub default_timezone: Tz,
    pub csv_payload: bool,
}

impl TaskConfig {
    /// Validates raw options. `partition_count` is the number of upstream
    /// partitions and the default pool size.
    pub fn from_options(options: TaskOptions, partition_count: usize) -> Result<Self, ConfigError> {
        if options.reject_on_materialized_type_error == Some(true) {
            warn!("`reject_on_materialized_type_error` has no effect on delimited loads, ignoring it");
        }
        if options.user.is_none() && options.username.is_some() {
            warn!("`username` is deprecated, use `user`");
        }
        let user = options
            .user
            .or(options.username)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingField("user"))?;

        let table = options
            .table
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingField("table"))?;

        let mode = match options.mode {
            Some(mode) => mode.parse::<LoadMode>()?,
            None => LoadMode::default(),
        };

        let copy_mode = match options.copy_mode {
            Some(mode) => mode
                .parse::<CopyMode>()
                .map_err(|_| ConfigError::UnsupportedCopyMode(mode.trim().to_ascii_uppercase()))?,
            None => CopyMode::default(),
        };

        let delimiter = match options.delimiter {
            Some(d) => single_char(&d)?,
            None => DEFAULT_DELIMITER,
        };

        let pool_size = options.pool.unwrap_or(partition_count);
        if pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool",
                message: "pool size must be at least 1".to_string(),
            });
        }

        if pool_size > partition_count {
            warn!(
                pool_size,
                partitions = partition_count,
                "Pool is larger than the partition count, extra workers stay idle"
            );
        }

        let queue_capacity = options.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity",
                message: "queue capacity must be at least 1".to_string(),
            });
        }

        let enqueue = seconds("enqueue_timeout", options.enqueue_timeout)?;
        let write = seconds("write_timeout", options.write_timeout)?;
        let timeouts = Timeouts {
            enqueue: enqueue.or(write),
            write: write.or(enqueue),
            dequeue: seconds("dequeue_timeout", options.dequeue_timeout)?,
            finish: seconds("finish_timeout", options.finish_timeout)?,
        };

        let default_timezone = match options.default_timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "default_timezone",
                    message: e.to_string(),
                })?,
            None => Tz::UTC,
        };

        Ok(Self {
            connection: ConnectionParams {
                host: options.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: options.port.unwrap_or(DEFAULT_PORT),
                user,
                password: options.password.unwrap_or_default(),
                database: options
                    .database
                    .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                resource_pool: options.resource_pool.filter(|p| !p.is_empty()),
            },
            schema: options.schema.unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            table,
            mode,
            copy_mode,
            abort_on_error: options.abort_on_error.unwrap_or(false),
            delimiter,
            pool_size,
            queue_capacity,
            timeouts,
            column_options: options.column_options,
            load_time_col: options.load_time_col.filter(|c| !c.is_empty()),
            default_timezone,
            csv_payload: options.csv_payload.unwrap_or(false),
        })
    }

    pub fn qualified_table(&self) -> String {
        qualified_table(&self.schema, &self.table)
    }

    /// The COPY every worker opens: schema columns plus the load time column.
    pub fn load_request(&self, schema: &Schema) -> LoadRequest {
        let mut columns = schema.names().map(str::to_string).collect::<Vec<_>>();
        if let Some(col) = &self.load_time_col {
            columns.push(col.clone());
        }

        LoadRequest {
            schema: self.schema.clone(),
            table: self.table.clone(),
            columns,
            delimiter: self.delimiter,
            copy_mode: self.copy_mode,
            abort_on_error: self.abort_on_error,
        }
    }
}

fn single_char(value: &str) -> Result<char, ConfigError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '\n' && c != '\r' => Ok(c),
        _ => Err(ConfigError::InvalidValue {
            field: "delimiter",
            message: format!("expected a single character, got {value:?}"),
        }),
    }
}

fn seconds(field: &'static str, value: Option<f64>) -> Result<Option<Duration>, ConfigError> {
    match value {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field,
                message: format!("timeout of {secs} seconds is out of range: {e}"),
            }),
        Some(secs) => Err(ConfigError::InvalidValue {
            field,
            message: format!("timeout must be a positive number of seconds, got {secs}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::{data_type::LogicalType, schema::Column};

    fn minimal() -> TaskOptions {
        TaskOptions {
            user: Some("dbadmin".into()),
            table: Some("events".into()),
            ..Default::default()
        }
    }

    #[test]
    fn applies_defaults() {
        let cfg = TaskConfig::from_options(minimal(), 3).unwrap();
        assert_eq!(cfg.connection.host, "localhost");
        assert_eq!(cfg.connection.port, 5433);
        assert_eq!(cfg.connection.database, "vdb");
        assert_eq!(cfg.connection.password, "");
        assert_eq!(cfg.schema, "public");
        assert_eq!(cfg.mode, LoadMode::DirectCopy);
        assert_eq!(cfg.copy_mode, CopyMode::Direct);
        assert_eq!(cfg.delimiter, '|');
        assert_eq!(cfg.pool_size, 3);
        assert_eq!(cfg.queue_capacity, 1);
        assert_eq!(cfg.timeouts, Timeouts::default());
        assert_eq!(cfg.default_timezone, Tz::UTC);
        assert!(!cfg.abort_on_error);
    }

    #[test]
    fn username_is_accepted_as_alias() {
        let opts = TaskOptions {
            user: None,
            username: Some("legacy".into()),
            ..minimal()
        };
        let cfg = TaskConfig::from_options(opts, 1).unwrap();
        assert_eq!(cfg.connection.user, "legacy");
    }

    #[test]
    fn missing_user_or_table_fails() {
        let no_user = TaskOptions {
            user: None,
            ..minimal()
        };
        assert!(matches!(
            TaskConfig::from_options(no_user, 1),
            Err(ConfigError::MissingField("user"))
        ));

        let no_table = TaskOptions {
            table: None,
            ..minimal()
        };
        assert!(matches!(
            TaskConfig::from_options(no_table, 1),
            Err(ConfigError::MissingField("table"))
        ));
    }

    #[test]
    fn validates_modes() {
        let bad_mode = TaskOptions {
            mode: Some("insert".into()),
            ..minimal()
        };
        assert!(matches!(
            TaskConfig::from_options(bad_mode, 1),
            Err(ConfigError::UnsupportedMode(m)) if m == "INSERT"
        ));

        let bad_copy = TaskOptions {
            copy_mode: Some("bulk".into()),
            ..minimal()
        };
        assert!(matches!(
            TaskConfig::from_options(bad_copy, 1),
            Err(ConfigError::UnsupportedCopyMode(m)) if m == "BULK"
        ));

        let lower = TaskOptions {
            mode: Some("direct_copy".into()),
            copy_mode: Some("auto".into()),
            ..minimal()
        };
        let cfg = TaskConfig::from_options(lower, 1).unwrap();
        assert_eq!(cfg.copy_mode, CopyMode::Auto);
    }

    #[test]
    fn enqueue_and_write_timeouts_default_to_each_other() {
        let opts = TaskOptions {
            write_timeout: Some(660.0),
            dequeue_timeout: Some(780.0),
            ..minimal()
        };
        let cfg = TaskConfig::from_options(opts, 1).unwrap();
        assert_eq!(cfg.timeouts.enqueue, Some(Duration::from_secs(660)));
        assert_eq!(cfg.timeouts.write, Some(Duration::from_secs(660)));
        assert_eq!(cfg.timeouts.dequeue, Some(Duration::from_secs(780)));
        assert_eq!(cfg.timeouts.finish, None);
    }

    #[test]
    fn ignores_json_only_options() {
        let opts = TaskOptions {
            reject_on_materialized_type_error: Some(true),
            ..minimal()
        };
        assert!(TaskConfig::from_options(opts, 1).is_ok());
    }

    #[test]
    fn rejects_invalid_numbers() {
        let zero_pool = TaskOptions {
            pool: Some(0),
            ..minimal()
        };
        assert!(TaskConfig::from_options(zero_pool, 4).is_err());
        assert!(TaskConfig::from_options(minimal(), 0).is_err());

        let negative = TaskOptions {
            finish_timeout: Some(-1.0),
            ..minimal()
        };
        assert!(matches!(
            TaskConfig::from_options(negative, 1),
            Err(ConfigError::InvalidValue {
                field: "finish_timeout",
                ..
            })
        ));

        let huge = TaskOptions {
            write_timeout: Some(1e20),
            ..minimal()
        };
        assert!(matches!(
            TaskConfig::from_options(huge, 1),
            Err(ConfigError::InvalidValue {
                field: "write_timeout",
                ..
            })
        ));

        let wide = TaskOptions {
            delimiter: Some("||".into()),
            ..minimal()
        };
        assert!(TaskConfig::from_options(wide, 1).is_err());

        let tz = TaskOptions {
            default_timezone: Some("Mars/Olympus".into()),
            ..minimal()
        };
        assert!(TaskConfig::from_options(tz, 1).is_err());
    }

    #[test]
    fn load_request_includes_load_time_column() {
        let opts = TaskOptions {
            load_time_col: Some("loaded_at".into()),
            abort_on_error: Some(true),
            ..minimal()
        };
        let cfg = TaskConfig::from_options(opts, 1).unwrap();
        let schema = Schema::new(vec![Column::new("id", LogicalType::Long)]);

        let req = cfg.load_request(&schema);
        assert_eq!(req.columns, vec!["id".to_string(), "loaded_at".to_string()]);
        assert!(req.abort_on_error);
        assert_eq!(cfg.qualified_table(), r#""public"."events""#);
    }
}
