use crate::{
    quote::{qualified_table, quote_identifier, quote_literal},
    warehouse::LoadRequest,
};

/// Builds the COPY statement for a streaming load.
pub fn copy_statement(request: &LoadRequest) -> String {
    let columns = request
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "COPY {} ({columns}) FROM STDIN DELIMITER {} NULL ''",
        qualified_table(&request.schema, &request.table),
        quote_literal(&request.delimiter.to_string()),
    );

    if request.abort_on_error {
        sql.push_str(" ABORT ON ERROR");
    }
    sql.push(' ');
    sql.push_str(request.copy_mode.as_sql());
    sql.push_str(" NO COMMIT");
    sql
}

/// Pins the session to a Vertica resource pool.
pub fn resource_pool_statement(pool: &str) -> String {
    format!("SET SESSION RESOURCE_POOL = {}", quote_literal(pool))
}
