use crate::{
    pool::{routing::Dispatcher, state::PoolState},
    worker::{WorkerHandle, WorkerSignals, live::LiveWorker, writer::StreamWriter},
};
use connectors::{
    encoder::RowEncoder,
    params::ConnectionParams,
    warehouse::{LoadRequest, LoadStream, WarehouseClient, WarehouseConnection},
};
use engine_config::settings::TaskConfig;
use engine_core::{abort::AbortSignal, error::LoadError, queue::bounded};
use futures::{StreamExt, future::join_all, stream::FuturesUnordered};
use model::{
    records::batch::RecordBatch,
    report::{WorkerReport, WorkerStatus},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

/// Extra time a worker gets past its finish deadline to tear down before its
/// task is cancelled.
const ABORT_GRACE: Duration = Duration::from_secs(5);

type Slot = (
    usize,
    Box<dyn WarehouseConnection>,
    Box<dyn LoadStream>,
);

/// Fixed-size set of workers for one transaction.
///
/// After `commit` or `abort` returns, whatever the outcome, every worker has
/// reached a terminal state and no load stream is left open.
pub struct LoadPool {
    config: Arc<TaskConfig>,
    client: Arc<dyn WarehouseClient>,
    encoder: Arc<dyn RowEncoder>,
    request: LoadRequest,
    state: PoolState,
    abort: AbortSignal,
    signals: Option<WorkerSignals>,
    dispatcher: Dispatcher,
    workers: Vec<WorkerHandle>,
    reports: Vec<WorkerReport>,
}

impl LoadPool {
    pub fn new(
        config: Arc<TaskConfig>,
        client: Arc<dyn WarehouseClient>,
        encoder: Arc<dyn RowEncoder>,
        request: LoadRequest,
    ) -> Self {
        let abort = AbortSignal::new();
        let dispatcher = Dispatcher::new(config.timeouts.enqueue, abort.clone());
        Self {
            config,
            client,
            encoder,
            request,
            state: PoolState::Created,
            abort,
            signals: None,
            dispatcher,
            workers: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Handle for producers. Stays valid after the pool closes but rejects
    /// every batch from then on.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Lets an outside party (e.g. a signal handler) abort the pool.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Reports collected by the last `commit` or `abort`, ordered by worker.
    pub fn reports(&self) -> &[WorkerReport] {
        &self.reports
    }

    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.workers.iter().map(|w| w.status()).collect()
    }

    pub async fn dispatch(&self, batch: RecordBatch) -> Result<(), LoadError> {
        self.dispatcher.dispatch(batch).await
    }

    /// Opens one connection and one load stream per slot and spawns the
    /// workers. If any slot fails, the streams already opened are discarded
    /// and the pool is left `Failed`.
    pub async fn start(&mut self) -> Result<(), LoadError> {
        if self.state != PoolState::Created {
            return Err(LoadError::InvalidState(format!(
                "cannot start a pool that is {}",
                self.state
            )));
        }

        let size = self.config.pool_size;
        info!(
            pool_size = size,
            table = %self.config.qualified_table(),
            copy_mode = %self.request.copy_mode,
            "Starting load pool"
        );

        let opened = join_all(
            (0..size)
                .map(|id| open_slot(self.client.as_ref(), &self.config.connection, &self.request, id)),
        )
        .await;

        let mut slots = Vec::with_capacity(size);
        let mut first_error = None;
        for result in opened {
            match result {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            error!(error = %err, opened = slots.len(), "Load pool failed to start");
            join_all(slots.into_iter().map(teardown_slot)).await;
            self.abort.trigger(err.clone());
            self.state = PoolState::Failed;
            return Err(err);
        }

        let signals = WorkerSignals::new(size, self.abort.clone());
        let mut senders = Vec::with_capacity(size);
        for (id, connection, stream) in slots {
            let (tx, rx) = bounded(self.config.queue_capacity, self.abort.token().clone());
            let writer = StreamWriter::new(
                id,
                stream,
                Arc::clone(&self.encoder),
                self.config.timeouts.write,
            );
            let worker = LiveWorker::new(
                id,
                rx,
                connection,
                writer,
                self.config.timeouts,
                signals.clone(),
            );
            self.workers.push(WorkerHandle::spawn(worker));
            senders.push(tx);
        }
        self.dispatcher.open(senders);
        self.signals = Some(signals);
        self.state = PoolState::Running;

        info!(pool_size = size, "Load pool running");
        Ok(())
    }

    /// Signals every worker to drain and finalize, then waits for all of
    /// them in parallel, each bounded by the finish timeout.
    ///
    /// All reports are collected even when a worker fails; they stay
    /// available through [`LoadPool::reports`] after an error.
    pub async fn commit(&mut self) -> Result<Vec<WorkerReport>, LoadError> {
        match self.state {
            PoolState::Running => {}
            PoolState::Committed => {
                return Err(LoadError::InvalidState(
                    "pool is already committed".to_string(),
                ));
            }
            other => {
                return Err(LoadError::InvalidState(format!(
                    "cannot commit a pool that is {other}"
                )));
            }
        }

        info!(workers = self.workers.len(), "Committing load pool");
        self.dispatcher.close();
        if let Some(signals) = &self.signals {
            signals.finish.cancel();
        }

        let limit = self.config.timeouts.finish.map(|f| f + ABORT_GRACE);
        self.reports = self.collect(limit).await;

        if let Some(failed) = self.reports.iter().find(|r| !r.is_committed()) {
            self.state = PoolState::Failed;
            let err = self.abort.cause().unwrap_or_else(|| {
                LoadError::Aborted(format!(
                    "worker {} stopped as {}",
                    failed.worker_id, failed.status
                ))
            });
            error!(error = %err, "Load pool commit failed");
            return Err(err);
        }

        self.state = PoolState::Committed;
        info!(
            workers = self.reports.len(),
            rows_in = self.reports.iter().map(|r| r.num_input_rows).sum::<u64>(),
            rows_out = self.reports.iter().map(|r| r.num_output_rows).sum::<u64>(),
            "Load pool committed"
        );
        Ok(self.reports.clone())
    }

    /// Makes every worker discard its queue and tear its stream down.
    ///
    /// A no-op once the pool is committed, aborted or failed.
    pub async fn abort(&mut self) {
        match self.state {
            PoolState::Created => {
                self.state = PoolState::Aborted;
                return;
            }
            closed if closed.is_closed() => {
                debug!(state = %closed, "Abort ignored, pool already closed");
                return;
            }
            _ => {}
        }

        warn!(workers = self.workers.len(), "Aborting load pool");
        self.abort
            .trigger(LoadError::Aborted("abort requested".to_string()));
        self.dispatcher.close();

        self.reports = self.collect(None).await;
        self.state = PoolState::Aborted;
    }

    /// Fan-in over every worker. A worker that stops without committing
    /// aborts the rest so no one waits on a doomed transaction.
    async fn collect(&mut self, limit: Option<Duration>) -> Vec<WorkerReport> {
        let abort = self.abort.clone();
        let mut pending = self
            .workers
            .drain(..)
            .map(|handle| {
                let abort = abort.clone();
                async move { handle.wait(limit, ABORT_GRACE, &abort).await }
            })
            .collect::<FuturesUnordered<_>>();

        let mut reports = Vec::new();
        while let Some(report) = pending.next().await {
            debug!(
                worker = report.worker_id,
                status = %report.status,
                rows_in = report.num_input_rows,
                rows_out = report.num_output_rows,
                "Worker reported"
            );
            if !report.is_committed() && !abort.is_triggered() {
                abort.trigger(LoadError::Aborted(format!(
                    "worker {} stopped as {}",
                    report.worker_id, report.status
                )));
            }
            reports.push(report);
        }

        reports.sort_by_key(|r| r.worker_id);
        reports
    }
}

impl Drop for LoadPool {
    fn drop(&mut self) {
        if self.state == PoolState::Running {
            warn!("Load pool dropped while running, aborting workers");
            self.abort
                .trigger(LoadError::Aborted("load pool dropped".to_string()));
            self.dispatcher.close();
        }
    }
}

async fn open_slot(
    client: &dyn WarehouseClient,
    params: &ConnectionParams,
    request: &LoadRequest,
    id: usize,
) -> Result<Slot, LoadError> {
    let mut connection = client
        .connect(params)
        .await
        .map_err(|e| LoadError::Connectivity(format!("worker {id}: {e}")))?;

    match connection.begin_load(request).await {
        Ok(stream) => {
            debug!(worker = id, "Load stream opened");
            Ok((id, connection, stream))
        }
        Err(e) => {
            if let Err(close_err) = connection.close().await {
                warn!(worker = id, error = %close_err, "Failed to close connection");
            }
            Err(LoadError::StreamFailure {
                worker: id,
                message: format!("cannot open load stream: {e}"),
            })
        }
    }
}

async fn teardown_slot((id, mut connection, mut stream): Slot) {
    if let Err(e) = stream.discard().await {
        warn!(worker = id, error = %e, "Failed to discard load stream");
    }
    if let Err(e) = connection.close().await {
        warn!(worker = id, error = %e, "Failed to close connection");
    }
}
