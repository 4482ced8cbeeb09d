use crate::{
    error::TransactionError,
    execution::reconcile::{count_rows, probe, reconcile, sample_rows},
};
use chrono::Utc;
use connectors::{ddl::sql_schema, encoder::DelimitedEncoder, warehouse::WarehouseClient};
use engine_config::settings::{TaskConfig, TaskOptions};
use engine_core::error::LoadError;
use engine_processing::pool::{Dispatcher, LoadPool};
use model::{
    core::schema::Schema,
    report::{TransactionReport, WorkerReport},
};
use serde::Serialize;
use std::{collections::BTreeMap, future::Future, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of a committed and reconciled transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionOutcome {
    pub transaction_id: Uuid,
    pub report: TransactionReport,
    pub worker_reports: Vec<WorkerReport>,
    /// Configuration to feed into the next run. Always empty: nothing is
    /// carried between runs.
    pub next_config: BTreeMap<String, serde_json::Value>,
}

/// Runs one load transaction with a default orchestrator.
pub async fn run_transaction<P, Fut>(
    client: Arc<dyn WarehouseClient>,
    options: TaskOptions,
    schema: Schema,
    partition_count: usize,
    produce: P,
) -> Result<TransactionOutcome, TransactionError>
where
    P: FnOnce(Dispatcher) -> Fut,
    Fut: Future<Output = Result<(), LoadError>>,
{
    TransactionOrchestrator::new(client)
        .execute(options, schema, partition_count, produce)
        .await
}

/// Top-level entry point of a load job: validate, probe, start the pool, let
/// the producers run, commit, then reconcile against the target table.
pub struct TransactionOrchestrator {
    client: Arc<dyn WarehouseClient>,
    cancel: CancellationToken,
}

impl TransactionOrchestrator {
    pub fn new(client: Arc<dyn WarehouseClient>) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling `cancel` aborts the pool; blocked producers and workers
    /// wake up and the transaction fails with an abort error.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn execute<P, Fut>(
        &self,
        options: TaskOptions,
        schema: Schema,
        partition_count: usize,
        produce: P,
    ) -> Result<TransactionOutcome, TransactionError>
    where
        P: FnOnce(Dispatcher) -> Fut,
        Fut: Future<Output = Result<(), LoadError>>,
    {
        let config = Arc::new(TaskConfig::from_options(options, partition_count)?);
        // Every column needs a warehouse type before anything is loaded.
        sql_schema(&schema, &config.column_options).map_err(LoadError::from)?;
        let transaction_id = Uuid::new_v4();
        let table = config.qualified_table();
        info!(
            transaction_id = %transaction_id,
            table = %table,
            pool_size = config.pool_size,
            partitions = partition_count,
            "Starting load transaction"
        );

        let start = Instant::now();
        let result = self.load(&config, schema, transaction_id, produce).await;

        sample_rows(self.client.as_ref(), &config.connection, &table).await;

        match &result {
            Ok(outcome) => info!(
                transaction_id = %transaction_id,
                report = %outcome.report,
                duration_ms = start.elapsed().as_millis() as u64,
                "Load transaction succeeded"
            ),
            Err(e) => error!(
                transaction_id = %transaction_id,
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Load transaction failed"
            ),
        }
        result
    }

    async fn load<P, Fut>(
        &self,
        config: &Arc<TaskConfig>,
        schema: Schema,
        transaction_id: Uuid,
        produce: P,
    ) -> Result<TransactionOutcome, TransactionError>
    where
        P: FnOnce(Dispatcher) -> Fut,
        Fut: Future<Output = Result<(), LoadError>>,
    {
        probe(self.client.as_ref(), &config.connection).await?;

        let load_time = config.load_time_col.as_ref().map(|_| Utc::now());
        let encoder = DelimitedEncoder::new(config.delimiter, schema.len())
            .with_timezone(config.default_timezone)
            .with_load_time(load_time)
            .with_csv_payload(config.csv_payload);
        let request = config.load_request(&schema);

        let mut pool = LoadPool::new(
            Arc::clone(config),
            Arc::clone(&self.client),
            Arc::new(encoder),
            request,
        );

        let abort = pool.abort_signal();
        let cancel = self.cancel.clone();
        let watcher = tokio::spawn(async move {
            cancel.cancelled().await;
            warn!("Cancellation requested, aborting load pool");
            abort.trigger(LoadError::Aborted("cancellation requested".to_string()));
        });

        let committed = self.drive(&mut pool, produce).await;
        watcher.abort();

        let worker_reports = match committed {
            Ok(reports) => reports,
            Err(err) => return Err(TransactionError::new(err, pool.reports().to_vec())),
        };

        let verified = count_rows(
            self.client.as_ref(),
            &config.connection,
            &config.qualified_table(),
        )
        .await
        .map_err(|e| TransactionError::new(e, worker_reports.clone()))?;

        let report = match reconcile(&worker_reports, verified, config.abort_on_error) {
            Ok(report) => report,
            Err(err) => {
                let report = match &err {
                    LoadError::Reconciliation { report } => Some(*report),
                    _ => None,
                };
                return Err(TransactionError {
                    source: err,
                    worker_reports,
                    report,
                });
            }
        };

        Ok(TransactionOutcome {
            transaction_id,
            report,
            worker_reports,
            next_config: BTreeMap::new(),
        })
    }

    /// start -> produce -> commit. Any failure before commit aborts the pool.
    async fn drive<P, Fut>(
        &self,
        pool: &mut LoadPool,
        produce: P,
    ) -> Result<Vec<WorkerReport>, LoadError>
    where
        P: FnOnce(Dispatcher) -> Fut,
        Fut: Future<Output = Result<(), LoadError>>,
    {
        pool.start().await?;

        if let Err(err) = produce(pool.dispatcher()).await {
            error!(error = %err, "Producers failed, aborting load pool");
            pool.abort().await;
            return Err(err);
        }

        if self.cancel.is_cancelled() {
            pool.abort().await;
            return Err(LoadError::Aborted("cancellation requested".to_string()));
        }

        pool.commit().await
    }
}
