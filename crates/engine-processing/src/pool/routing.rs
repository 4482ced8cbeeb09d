use engine_core::{
    abort::AbortSignal,
    error::{LoadError, TimeoutKind},
    queue::{QueueError, QueueSender},
};
use model::records::batch::RecordBatch;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::warn;

/// Worker slot for a partition.
///
/// Partitions map onto workers by `partition_index % pool_size`. With fewer
/// workers than partitions several partitions share a worker; with more,
/// the surplus workers stay idle and commit an empty stream. Either way all
/// batches of one partition land on the same stream in dispatch order.
pub fn route(partition_index: usize, pool_size: usize) -> usize {
    partition_index % pool_size.max(1)
}

/// Cloneable handle producers use to hand batches to the pool.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    senders: Mutex<Option<Vec<QueueSender<RecordBatch>>>>,
    enqueue_timeout: Option<Duration>,
    abort: AbortSignal,
}

impl Dispatcher {
    pub(crate) fn new(enqueue_timeout: Option<Duration>, abort: AbortSignal) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                senders: Mutex::new(None),
                enqueue_timeout,
                abort,
            }),
        }
    }

    pub(crate) fn open(&self, senders: Vec<QueueSender<RecordBatch>>) {
        *self.lock() = Some(senders);
    }

    /// Drops the pool's senders; workers see their queue close once any
    /// in-flight dispatch completes.
    pub(crate) fn close(&self) {
        self.lock().take();
    }

    /// Routes `batch` to its partition's worker, blocking while that
    /// worker's queue is full.
    ///
    /// Waiting longer than the enqueue timeout fails the whole transaction.
    /// If the pool aborts while waiting, the error that caused the abort is
    /// returned.
    pub async fn dispatch(&self, batch: RecordBatch) -> Result<(), LoadError> {
        if self.inner.abort.is_triggered() {
            return Err(self.inner.abort.cause_or_aborted());
        }

        let (worker, sender) = {
            let guard = self.lock();
            let Some(senders) = guard.as_ref().filter(|s| !s.is_empty()) else {
                return Err(LoadError::InvalidState(
                    "pool is not accepting batches".to_string(),
                ));
            };
            let worker = route(batch.partition_index, senders.len());
            (worker, senders[worker].clone())
        };

        match sender.send_within(batch, self.inner.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(QueueError::Elapsed(after)) => {
                let err = LoadError::Timeout {
                    kind: TimeoutKind::Enqueue,
                    worker,
                    after,
                };
                warn!(worker, error = %err, "Worker queue stayed full, aborting pool");
                self.inner.abort.trigger(err);
                Err(self.inner.abort.cause_or_aborted())
            }
            Err(QueueError::Cancelled) | Err(QueueError::Closed) => {
                Err(self.inner.abort.cause_or_aborted())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<QueueSender<RecordBatch>>>> {
        self.inner
            .senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::queue::bounded;
    use model::core::value::Value;

    fn batch(partition: usize, id: i64) -> RecordBatch {
        RecordBatch::new(partition, vec![vec![Value::Long(id)]])
    }

    #[test]
    fn routes_by_modulo() {
        assert_eq!(route(0, 3), 0);
        assert_eq!(route(4, 3), 1);
        assert_eq!(route(5, 1), 0);
        assert_eq!(route(2, 0), 0);
    }

    #[tokio::test]
    async fn dispatch_keeps_partition_affinity() {
        let abort = AbortSignal::new();
        let (tx0, mut rx0) = bounded(4, abort.token().clone());
        let (tx1, mut rx1) = bounded(4, abort.token().clone());
        let dispatcher = Dispatcher::new(None, abort);
        dispatcher.open(vec![tx0, tx1]);

        dispatcher.dispatch(batch(1, 1)).await.unwrap();
        dispatcher.dispatch(batch(3, 2)).await.unwrap();
        dispatcher.dispatch(batch(2, 3)).await.unwrap();
        dispatcher.close();

        let mut on_one = Vec::new();
        while let Some(b) = rx1.recv_within(None).await.unwrap() {
            on_one.push(b.rows[0][0].clone());
        }
        assert_eq!(on_one, vec![Value::Long(1), Value::Long(2)]);
        assert_eq!(rx0.recv_within(None).await.unwrap().map(|b| b.partition_index), Some(2));
    }

    #[tokio::test]
    async fn closed_dispatcher_rejects() {
        let dispatcher = Dispatcher::new(None, AbortSignal::new());
        let err = dispatcher.dispatch(batch(0, 1)).await.unwrap_err();
        assert!(matches!(err, LoadError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_times_out_and_aborts() {
        let abort = AbortSignal::new();
        let (tx, _rx) = bounded(1, abort.token().clone());
        let dispatcher = Dispatcher::new(Some(Duration::from_millis(20)), abort.clone());
        dispatcher.open(vec![tx]);

        dispatcher.dispatch(batch(0, 1)).await.unwrap();
        let err = dispatcher.dispatch(batch(0, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Timeout {
                kind: TimeoutKind::Enqueue,
                worker: 0,
                ..
            }
        ));
        assert!(abort.is_triggered());
    }
}
