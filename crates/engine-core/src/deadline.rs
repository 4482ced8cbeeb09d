use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// Why a bounded wait gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Elapsed(Duration),
    Cancelled,
}

/// Drives `fut` until it completes, `limit` elapses or `cancel` fires.
///
/// Cancellation is checked first, so an already-cancelled token wins over a
/// ready future.
pub async fn run_until<F>(
    fut: F,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = within(fut, limit) => res,
    }
}

/// Like [`run_until`] without a cancellation source.
pub async fn within<F>(fut: F, limit: Option<Duration>) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Interrupted::Elapsed(limit)),
        None => Ok(fut.await),
    }
}
