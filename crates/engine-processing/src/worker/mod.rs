use crate::worker::live::LiveWorker;
use engine_core::{
    abort::AbortSignal,
    deadline::within,
    error::{LoadError, TimeoutKind},
    metrics::Metrics,
};
use model::report::{WorkerReport, WorkerStatus};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Barrier, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub mod live;
pub mod writer;

/// How a worker left its loop before committing.
#[derive(Debug)]
pub enum WorkerExit {
    /// The pool token fired; tear down without committing.
    Aborted,
    /// Timeout or stream error local to this worker.
    Failed(LoadError),
}

/// Pool-wide signals every worker observes.
#[derive(Clone)]
pub struct WorkerSignals {
    /// Fired by `commit`: stop waiting for work and drain.
    pub finish: CancellationToken,
    /// Every worker waits here after draining, so no stream is committed
    /// while another worker can still fail its writes.
    pub drained: Arc<Barrier>,
    pub abort: AbortSignal,
}

impl WorkerSignals {
    pub fn new(workers: usize, abort: AbortSignal) -> Self {
        Self {
            finish: CancellationToken::new(),
            drained: Arc::new(Barrier::new(workers)),
            abort,
        }
    }
}

/// Pool-side view of a spawned worker.
pub struct WorkerHandle {
    worker_id: usize,
    metrics: Metrics,
    status: watch::Receiver<WorkerStatus>,
    started: Instant,
    join: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    pub fn spawn(worker: LiveWorker) -> Self {
        let worker_id = worker.id();
        let metrics = worker.metrics();
        let status = worker.subscribe();
        worker.mark_running();
        let join = tokio::spawn(worker.run());
        Self {
            worker_id,
            metrics,
            status,
            started: Instant::now(),
            join,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        *self.status.borrow()
    }

    /// Waits for the worker's report.
    ///
    /// A worker still running after `limit` is charged with a finish timeout,
    /// the pool is aborted, and it gets `grace` to tear its stream down before
    /// the task is cancelled outright.
    pub async fn wait(
        mut self,
        limit: Option<Duration>,
        grace: Duration,
        abort: &AbortSignal,
    ) -> WorkerReport {
        match within(&mut self.join, limit).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!(worker = self.worker_id, error = %e, "Worker task ended abnormally");
                let err = LoadError::StreamFailure {
                    worker: self.worker_id,
                    message: format!("worker task ended abnormally: {e}"),
                };
                abort.trigger(err.clone());
                self.synthesize(WorkerStatus::Failed, Some(err))
            }
            Err(_) => {
                let after = limit.unwrap_or_default();
                let err = LoadError::Timeout {
                    kind: TimeoutKind::Finish,
                    worker: self.worker_id,
                    after,
                };
                warn!(worker = self.worker_id, error = %err, "Worker did not finish in time");
                abort.trigger(err.clone());

                match within(&mut self.join, Some(grace)).await {
                    Ok(Ok(mut report)) => {
                        report.status = WorkerStatus::Failed;
                        report.error = Some(err.to_string());
                        report
                    }
                    _ => {
                        self.join.abort();
                        self.synthesize(WorkerStatus::Failed, Some(err))
                    }
                }
            }
        }
    }

    fn synthesize(&self, status: WorkerStatus, error: Option<LoadError>) -> WorkerReport {
        let snapshot = self.metrics.snapshot();
        WorkerReport {
            worker_id: self.worker_id,
            status,
            num_input_rows: snapshot.rows_in,
            num_output_rows: snapshot.rows_out,
            duration_ms: self.started.elapsed().as_millis() as u64,
            error: error.map(|e| e.to_string()),
        }
    }
}
