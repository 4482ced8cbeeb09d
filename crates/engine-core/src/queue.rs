use crate::deadline::{Interrupted, run_until};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a queue operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    Elapsed(Duration),
    Cancelled,
    Closed,
}

impl From<Interrupted> for QueueError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::Elapsed(after) => QueueError::Elapsed(after),
            Interrupted::Cancelled => QueueError::Cancelled,
        }
    }
}

/// Bounded queue whose blocking operations take a deadline and observe a
/// shared cancellation token.
pub fn bounded<T>(capacity: usize, cancel: CancellationToken) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        QueueSender {
            tx,
            cancel: cancel.clone(),
        },
        QueueReceiver { rx, cancel },
    )
}

#[derive(Debug)]
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> QueueSender<T> {
    /// Waits for a free slot for at most `limit`. The item is dropped if the
    /// wait is interrupted.
    pub async fn send_within(&self, item: T, limit: Option<Duration>) -> Result<(), QueueError> {
        match run_until(self.tx.send(item), limit, &self.cancel).await? {
            Ok(()) => Ok(()),
            Err(_) => Err(QueueError::Closed),
        }
    }
}

#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> QueueReceiver<T> {
    /// `Ok(None)` once every sender is gone and the queue is empty.
    pub async fn recv_within(&mut self, limit: Option<Duration>) -> Result<Option<T>, QueueError> {
        Ok(run_until(self.rx.recv(), limit, &self.cancel).await?)
    }

    /// Stops accepting items and drops whatever is still buffered.
    pub fn close_and_clear(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_order() {
        let (tx, mut rx) = bounded(4, CancellationToken::new());
        for i in 0..3 {
            tx.send_within(i, None).await.unwrap();
        }
        drop(tx);

        let mut got = Vec::new();
        while let Some(item) = rx.recv_within(None).await.unwrap() {
            got.push(item);
        }
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_times_out() {
        let (tx, _rx) = bounded(1, CancellationToken::new());
        tx.send_within(1, None).await.unwrap();
        let limit = Duration::from_millis(100);
        assert_eq!(
            tx.send_within(2, Some(limit)).await,
            Err(QueueError::Elapsed(limit))
        );
    }

    #[tokio::test]
    async fn cancel_wakes_blocked_sender() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = bounded(1, cancel.clone());
        tx.send_within(1, None).await.unwrap();

        let blocked = tokio::spawn(async move { tx.send_within(2, None).await });
        cancel.cancel();
        assert_eq!(blocked.await.unwrap(), Err(QueueError::Cancelled));
    }

    #[tokio::test]
    async fn closed_receiver_rejects() {
        let (tx, mut rx) = bounded::<u8>(2, CancellationToken::new());
        tx.send_within(1, None).await.unwrap();
        assert_eq!(rx.close_and_clear(), 1);
        assert_eq!(tx.send_within(2, None).await, Err(QueueError::Closed));
    }
}
