use crate::worker::WorkerExit;
use connectors::{encoder::RowEncoder, warehouse::LoadStream};
use engine_core::{
    deadline::{Interrupted, run_until, within},
    error::{LoadError, TimeoutKind},
};
use model::records::batch::RecordBatch;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct WriteResult {
    pub rows_acknowledged: u64,
    pub bytes_written: u64,
}

/// Serializes batches and pushes them into one worker's load stream.
pub struct StreamWriter {
    worker_id: usize,
    stream: Box<dyn LoadStream>,
    encoder: Arc<dyn RowEncoder>,
    write_timeout: Option<Duration>,
}

impl StreamWriter {
    pub fn new(
        worker_id: usize,
        stream: Box<dyn LoadStream>,
        encoder: Arc<dyn RowEncoder>,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            worker_id,
            stream,
            encoder,
            write_timeout,
        }
    }

    pub async fn write_batch(
        &mut self,
        batch: &RecordBatch,
        cancel: &CancellationToken,
    ) -> Result<WriteResult, WorkerExit> {
        let start = Instant::now();
        let rows = batch.row_count();

        let chunk = self
            .encoder
            .encode(batch)
            .map_err(|e| self.stream_failure(format!("cannot encode batch: {e}")))?;
        let bytes_written = chunk.len() as u64;

        let rows_acknowledged =
            match run_until(self.stream.write(chunk, rows), self.write_timeout, cancel).await {
                Ok(Ok(acked)) => acked,
                Ok(Err(e)) => return Err(self.stream_failure(e.to_string())),
                Err(Interrupted::Elapsed(after)) => {
                    return Err(WorkerExit::Failed(LoadError::Timeout {
                        kind: TimeoutKind::Write,
                        worker: self.worker_id,
                        after,
                    }));
                }
                Err(Interrupted::Cancelled) => return Err(WorkerExit::Aborted),
            };

        let duration = start.elapsed();
        debug!(
            worker = self.worker_id,
            partition = batch.partition_index,
            rows,
            acknowledged = rows_acknowledged,
            bytes = bytes_written,
            duration_ms = duration.as_millis() as u64,
            "Batch written to load stream"
        );

        Ok(WriteResult {
            rows_acknowledged,
            bytes_written,
        })
    }

    /// Ends the COPY and commits it. Bounded by the caller's finish deadline.
    pub async fn finish(&mut self) -> Result<u64, WorkerExit> {
        self.stream
            .finish()
            .await
            .map_err(|e| self.stream_failure(e.to_string()))
    }

    /// Tears the stream down without committing. Runs after the pool token
    /// has fired, so only the write deadline bounds it.
    pub async fn discard(&mut self) {
        if !self.stream.is_open() {
            return;
        }
        match within(self.stream.discard(), self.write_timeout).await {
            Ok(Ok(())) => debug!(worker = self.worker_id, "Load stream discarded"),
            Ok(Err(e)) => warn!(worker = self.worker_id, error = %e, "Failed to discard load stream"),
            Err(_) => warn!(worker = self.worker_id, "Timed out discarding load stream"),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    fn stream_failure(&self, message: String) -> WorkerExit {
        WorkerExit::Failed(LoadError::StreamFailure {
            worker: self.worker_id,
            message,
        })
    }
}
