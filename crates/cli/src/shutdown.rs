use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status after SIGINT/SIGTERM.
pub const INTERRUPTED_EXIT: u8 = 130;

/// Cancels the running transaction on SIGINT or SIGTERM, which aborts the
/// load pool.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Starts listening in the background.
    pub fn listen() -> Self {
        let shutdown = Self::default();
        let token = shutdown.token.clone();
        tokio::spawn(async move {
            let received = wait_for_signal().await;
            info!(signal = received, "Signal received, aborting load");
            token.cancel();
        });
        shutdown
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelling_the_token_marks_shutdown() {
        let shutdown = ShutdownSignal::default();
        assert!(!shutdown.is_requested());
        shutdown.token().cancel();
        assert!(shutdown.is_requested());
    }
}
