use crate::error::LoadError;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pool-wide abort switch.
///
/// The first recorded cause sticks; later triggers only re-cancel. Every
/// blocked enqueue, dequeue, write and finish selects on the same token.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    cause: Arc<Mutex<Option<LoadError>>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `cause` if none was recorded yet and cancels the token.
    /// Returns true when this call set the cause.
    pub fn trigger(&self, cause: LoadError) -> bool {
        let first = {
            let mut slot = self.cause.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                debug!(cause = %cause, "Abort triggered");
                *slot = Some(cause);
                true
            } else {
                false
            }
        };
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cause(&self) -> Option<LoadError> {
        self.cause
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The recorded cause, or a generic abort error when none was recorded.
    pub fn cause_or_aborted(&self) -> LoadError {
        self.cause()
            .unwrap_or_else(|| LoadError::Aborted("load pool was aborted".to_string()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
