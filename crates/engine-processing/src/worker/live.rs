use crate::worker::{WorkerExit, WorkerSignals, writer::StreamWriter};
use connectors::warehouse::WarehouseConnection;
use engine_config::settings::Timeouts;
use engine_core::{
    deadline::{Interrupted, run_until},
    error::{LoadError, TimeoutKind},
    metrics::Metrics,
    queue::{QueueError, QueueReceiver},
};
use model::{
    records::batch::RecordBatch,
    report::{WorkerReport, WorkerStatus},
};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// One pool slot: a queue of batches feeding one exclusively owned load
/// stream.
///
/// The worker publishes its status on a watch channel and returns its report
/// when it reaches a terminal state.
pub struct LiveWorker {
    id: usize,
    queue: QueueReceiver<RecordBatch>,
    connection: Box<dyn WarehouseConnection>,
    writer: StreamWriter,
    timeouts: Timeouts,
    signals: WorkerSignals,
    metrics: Metrics,
    status: watch::Sender<WorkerStatus>,
}

impl LiveWorker {
    pub fn new(
        id: usize,
        queue: QueueReceiver<RecordBatch>,
        connection: Box<dyn WarehouseConnection>,
        writer: StreamWriter,
        timeouts: Timeouts,
        signals: WorkerSignals,
    ) -> Self {
        let (status, _) = watch::channel(WorkerStatus::Idle);
        Self {
            id,
            queue,
            connection,
            writer,
            timeouts,
            signals,
            metrics: Metrics::new(),
            status,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    /// Published before the task is spawned, so a started pool only holds
    /// running workers.
    pub fn mark_running(&self) {
        self.status.send_replace(WorkerStatus::Running);
    }

    pub async fn run(mut self) -> WorkerReport {
        let started = Instant::now();
        info!(worker = self.id, "Worker started");

        let (status, error) = match self.process().await {
            Ok(committed) => {
                self.metrics.set_rows_out(committed);
                (WorkerStatus::Committed, None)
            }
            Err(WorkerExit::Aborted) => {
                self.writer.discard().await;
                (WorkerStatus::Aborted, None)
            }
            Err(WorkerExit::Failed(err)) => {
                error!(worker = self.id, error = %err, "Worker failed, aborting pool");
                self.signals.abort.trigger(err.clone());
                self.writer.discard().await;
                (WorkerStatus::Failed, Some(err.to_string()))
            }
        };

        let dropped = self.queue.close_and_clear();
        if dropped > 0 {
            debug!(worker = self.id, batches = dropped, "Dropped queued batches");
        }
        if let Err(e) = self.connection.close().await {
            warn!(worker = self.id, error = %e, "Failed to close worker connection");
        }

        let snapshot = self.metrics.snapshot();
        let duration_ms = started.elapsed().as_millis() as u64;
        self.status.send_replace(status);
        info!(
            worker = self.id,
            status = %status,
            rows_in = snapshot.rows_in,
            rows_out = snapshot.rows_out,
            batches = snapshot.batches_written,
            duration_ms,
            "Worker stopped"
        );

        WorkerReport {
            worker_id: self.id,
            status,
            num_input_rows: snapshot.rows_in,
            num_output_rows: snapshot.rows_out,
            duration_ms,
            error,
        }
    }

    /// Runs until the commit signal, then drains and finalizes. Returns the
    /// committed row count.
    ///
    /// The whole finishing phase, including the wait for the other workers
    /// to drain, is bounded by the finish timeout.
    async fn process(&mut self) -> Result<u64, WorkerExit> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.signals.finish.cancelled() => Ok(None),
                next = self.queue.recv_within(self.timeouts.dequeue) => next,
            };

            match next {
                Ok(Some(batch)) => self.write(batch).await?,
                Ok(None) | Err(QueueError::Closed) => break,
                Err(QueueError::Elapsed(after)) => {
                    return Err(WorkerExit::Failed(LoadError::Timeout {
                        kind: TimeoutKind::Dequeue,
                        worker: self.id,
                        after,
                    }));
                }
                Err(QueueError::Cancelled) => return Err(WorkerExit::Aborted),
            }
        }

        self.status.send_replace(WorkerStatus::Finishing);
        debug!(worker = self.id, "Worker finishing");

        let cancel = self.signals.abort.token().clone();
        let limit = self.timeouts.finish;
        match run_until(self.drain_and_finalize(), limit, &cancel).await {
            Ok(result) => result,
            Err(Interrupted::Elapsed(after)) => Err(WorkerExit::Failed(LoadError::Timeout {
                kind: TimeoutKind::Finish,
                worker: self.id,
                after,
            })),
            Err(Interrupted::Cancelled) => Err(WorkerExit::Aborted),
        }
    }

    async fn drain_and_finalize(&mut self) -> Result<u64, WorkerExit> {
        loop {
            match self.queue.recv_within(None).await {
                Ok(Some(batch)) => self.write(batch).await?,
                Ok(None) | Err(QueueError::Closed) => break,
                Err(QueueError::Cancelled) | Err(QueueError::Elapsed(_)) => {
                    return Err(WorkerExit::Aborted);
                }
            }
        }
        debug!(worker = self.id, "Worker drained, waiting for the pool");
        self.signals.drained.wait().await;
        self.writer.finish().await
    }

    async fn write(&mut self, batch: RecordBatch) -> Result<(), WorkerExit> {
        if batch.is_empty() {
            return Ok(());
        }
        self.metrics.increment_rows_in(batch.row_count());
        let result = self.writer.write_batch(&batch, self.signals.abort.token()).await?;
        self.metrics.increment_rows_out(result.rows_acknowledged);
        self.metrics.record_batch(result.bytes_written);
        Ok(())
    }
}
