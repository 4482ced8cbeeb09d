use thiserror::Error;

/// Errors raised while validating task options. None of them involve I/O
/// against the warehouse.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required field \"{0}\" is not set")]
    MissingField(&'static str),

    #[error("`mode` must be one of DIRECT_COPY, got '{0}'")]
    UnsupportedMode(String),

    #[error("`copy_mode` must be one of AUTO, DIRECT, TRICKLE, got '{0}'")]
    UnsupportedCopyMode(String),

    #[error("invalid value for `{field}`: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}
