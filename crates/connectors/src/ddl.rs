use crate::{error::DdlError, quote::{qualified_table, quote_identifier}};
use model::core::{data_type::LogicalType, schema::Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-column override from the `column_options` setting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnOption {
    #[serde(rename = "type", default)]
    pub sql_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

/// Warehouse type for a logical column type, if it has one.
pub fn sql_type_for(logical_type: LogicalType) -> Option<&'static str> {
    match logical_type {
        LogicalType::Boolean => Some("BOOLEAN"),
        // BIGINT is a synonym of INT in Vertica.
        LogicalType::Long => Some("INT"),
        // DOUBLE PRECISION is a synonym of FLOAT.
        LogicalType::Double => Some("FLOAT"),
        LogicalType::String => Some("VARCHAR"),
        LogicalType::Timestamp => Some("TIMESTAMP"),
        LogicalType::Json => None,
    }
}

/// Resolves the column definitions of the target table.
///
/// An explicit `column_options[name].type` wins over the mapped type.
pub fn sql_schema(
    schema: &Schema,
    column_options: &BTreeMap<String, ColumnOption>,
) -> Result<Vec<ColumnDef>, DdlError> {
    schema
        .columns()
        .iter()
        .map(|col| {
            let overridden = column_options
                .get(&col.name)
                .and_then(|opt| opt.sql_type.clone());

            let sql_type = match overridden {
                Some(sql_type) => sql_type,
                None => sql_type_for(col.logical_type)
                    .ok_or_else(|| DdlError::NotSupportedType {
                        column: col.name.clone(),
                        logical_type: col.logical_type.to_string(),
                    })?
                    .to_string(),
            };

            Ok(ColumnDef {
                name: col.name.clone(),
                sql_type,
            })
        })
        .collect()
}

pub fn create_table_sql(schema: &str, table: &str, columns: &[ColumnDef]) -> String {
    let defs = columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.sql_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({defs})",
        qualified_table(schema, table)
    )
}
