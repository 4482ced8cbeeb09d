use crate::settings::error::ConfigError;
use std::{fmt, str::FromStr};

/// Overall load strategy. Only streaming COPY is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    #[default]
    DirectCopy,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::DirectCopy => f.write_str("DIRECT_COPY"),
        }
    }
}

impl FromStr for LoadMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT_COPY" => Ok(LoadMode::DirectCopy),
            other => Err(ConfigError::UnsupportedMode(other.to_string())),
        }
    }
}
