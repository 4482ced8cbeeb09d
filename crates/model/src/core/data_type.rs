use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Logical column type as produced by the upstream extraction pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Boolean,
    #[serde(alias = "integer")]
    Long,
    Double,
    String,
    Timestamp,
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown logical type: {0}")]
pub struct UnknownLogicalType(pub String);

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Boolean => "boolean",
            LogicalType::Long => "long",
            LogicalType::Double => "double",
            LogicalType::String => "string",
            LogicalType::Timestamp => "timestamp",
            LogicalType::Json => "json",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = UnknownLogicalType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            "long" | "integer" | "int" => Ok(LogicalType::Long),
            "double" | "float" => Ok(LogicalType::Double),
            "string" => Ok(LogicalType::String),
            "timestamp" => Ok(LogicalType::Timestamp),
            "json" => Ok(LogicalType::Json),
            other => Err(UnknownLogicalType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!("INTEGER".parse::<LogicalType>(), Ok(LogicalType::Long));
        assert_eq!(" Bool ".parse::<LogicalType>(), Ok(LogicalType::Boolean));
        assert!("decimal".parse::<LogicalType>().is_err());
    }

    #[test]
    fn deserializes_integer_alias() {
        let ty: LogicalType = serde_json::from_str("\"integer\"").unwrap();
        assert_eq!(ty, LogicalType::Long);
    }
}
