use connectors::{
    params::ConnectionParams,
    warehouse::{WarehouseClient, WarehouseConnection},
};
use engine_core::error::LoadError;
use model::report::{TransactionReport, WorkerReport};
use tracing::{debug, info, trace, warn};

/// Rows fetched by the post-load diagnostic read.
const SAMPLE_ROWS: usize = 10;

/// Builds the transaction report and applies the row-count check.
///
/// A mismatch only fails the transaction when `abort_on_error` is set; the
/// loaded rows stay in place either way.
pub fn reconcile(
    worker_reports: &[WorkerReport],
    verified_rows: u64,
    abort_on_error: bool,
) -> Result<TransactionReport, LoadError> {
    let report = TransactionReport::from_worker_reports(worker_reports, verified_rows);
    if abort_on_error && !report.is_reconciled() {
        return Err(LoadError::Reconciliation { report });
    }
    if !report.is_reconciled() {
        warn!(
            input = report.num_input_rows,
            output = report.num_output_rows,
            rejected = report.num_rejected_rows,
            "Row counts differ"
        );
    }
    Ok(report)
}

/// Counts the rows in the target table on a fresh connection.
pub async fn count_rows(
    client: &dyn WarehouseClient,
    params: &ConnectionParams,
    table: &str,
) -> Result<u64, LoadError> {
    let mut conn = connect(client, params).await?;
    let result = conn.query(&format!("SELECT COUNT(*) FROM {table}")).await;
    close(conn).await;

    let result = result.map_err(|e| LoadError::Connectivity(format!("cannot count rows: {e}")))?;
    let count = result
        .scalar()
        .ok_or_else(|| LoadError::Connectivity("row count query returned nothing".to_string()))?;
    count
        .trim()
        .parse::<u64>()
        .map_err(|e| LoadError::Connectivity(format!("invalid row count '{count}': {e}")))
}

/// Logs a few rows of the target table. Never fails.
pub async fn sample_rows(client: &dyn WarehouseClient, params: &ConnectionParams, table: &str) {
    let mut conn = match connect(client, params).await {
        Ok(conn) => conn,
        Err(e) => {
            debug!(error = %e, "Skipping diagnostic read");
            return;
        }
    };

    let sql = format!("SELECT * FROM {table} LIMIT {SAMPLE_ROWS}");
    match conn.query(&sql).await {
        Ok(result) => {
            for row in result.render_rows() {
                trace!("{row}");
            }
        }
        Err(e) => debug!(error = %e, "Diagnostic read failed"),
    }
    close(conn).await;
}

/// Confirms the warehouse is reachable before any worker is started.
pub async fn probe(client: &dyn WarehouseClient, params: &ConnectionParams) -> Result<(), LoadError> {
    let conn = connect(client, params).await?;
    close(conn).await;
    info!(endpoint = %params.endpoint(), "Warehouse reachable");
    Ok(())
}

async fn connect(
    client: &dyn WarehouseClient,
    params: &ConnectionParams,
) -> Result<Box<dyn WarehouseConnection>, LoadError> {
    client
        .connect(params)
        .await
        .map_err(|e| LoadError::Connectivity(e.to_string()))
}

async fn close(mut conn: Box<dyn WarehouseConnection>) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::report::WorkerStatus;

    fn worker(id: usize, rows: u64) -> WorkerReport {
        WorkerReport {
            worker_id: id,
            status: WorkerStatus::Committed,
            num_input_rows: rows,
            num_output_rows: rows,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn mismatch_fails_only_with_abort_on_error() {
        let reports = vec![worker(0, 50), worker(1, 50)];

        let err = reconcile(&reports, 98, true).unwrap_err();
        match err {
            LoadError::Reconciliation { report } => {
                assert_eq!(report.num_input_rows, 100);
                assert_eq!(report.num_rejected_rows, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let report = reconcile(&reports, 98, false).unwrap();
        assert_eq!(report.num_output_rows, 98);
        assert_eq!(report.num_rejected_rows, 2);
    }

    #[test]
    fn matching_counts_pass() {
        let report = reconcile(&[worker(0, 30)], 30, true).unwrap();
        assert!(report.is_reconciled());
        assert_eq!(report.num_total_rows, 30);
    }
}
