use crate::error::CliError;
use connectors::{
    ddl::{ColumnDef, create_table_sql, sql_schema},
    vertica::VerticaClient,
    warehouse::WarehouseClient,
};
use engine_config::settings::TaskConfig;
use engine_runtime::execution::reconcile::probe;
use model::core::schema::Schema;
use tracing::warn;

/// CREATE TABLE statement for the job's columns, including the load time
/// column when one is configured.
pub fn create_table_statement(config: &TaskConfig, schema: &Schema) -> Result<String, CliError> {
    let mut columns = sql_schema(schema, &config.column_options)?;
    if let Some(load_time_col) = &config.load_time_col {
        columns.push(ColumnDef {
            name: load_time_col.clone(),
            sql_type: "TIMESTAMP".to_string(),
        });
    }
    Ok(create_table_sql(&config.schema, &config.table, &columns))
}

pub async fn create_table(
    client: &VerticaClient,
    config: &TaskConfig,
    schema: &Schema,
) -> Result<(), CliError> {
    let sql = create_table_statement(config, schema)?;
    let mut conn = client.connect(&config.connection).await?;
    let result = conn.query(&sql).await;
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close connection");
    }
    result?;
    Ok(())
}

pub async fn test_connection(client: &VerticaClient, config: &TaskConfig) -> Result<(), CliError> {
    probe(client, &config.connection).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::settings::TaskOptions;
    use model::core::{data_type::LogicalType, schema::Column};

    #[test]
    fn ddl_appends_load_time_column() {
        let options = TaskOptions {
            user: Some("dbadmin".into()),
            table: Some("events".into()),
            load_time_col: Some("loaded_at".into()),
            ..Default::default()
        };
        let config = TaskConfig::from_options(options, 1).unwrap();
        let schema = Schema::new(vec![
            Column::new("id", LogicalType::Long),
            Column::new("name", LogicalType::String),
        ]);

        assert_eq!(
            create_table_statement(&config, &schema).unwrap(),
            r#"CREATE TABLE IF NOT EXISTS "public"."events" ("id" INT, "name" VARCHAR, "loaded_at" TIMESTAMP)"#
        );
    }
}
