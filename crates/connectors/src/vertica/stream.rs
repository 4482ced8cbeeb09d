use crate::{error::StreamError, warehouse::LoadStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use std::{pin::Pin, sync::Arc};
use tokio_postgres::{Client, CopyInSink};
use tracing::{info, warn};

/// A `COPY FROM STDIN` in flight on one session.
///
/// Dropping the sink before `finish` makes the driver send `CopyFail`, which
/// is how `discard` aborts the load.
pub struct CopyStream {
    client: Arc<Client>,
    sink: Option<Pin<Box<CopyInSink<Bytes>>>>,
    target: String,
}

impl CopyStream {
    pub fn new(client: Arc<Client>, sink: CopyInSink<Bytes>, target: String) -> Self {
        Self {
            client,
            sink: Some(Box::pin(sink)),
            target,
        }
    }
}

#[async_trait]
impl LoadStream for CopyStream {
    async fn write(&mut self, chunk: Bytes, rows: u64) -> Result<u64, StreamError> {
        let sink = self.sink.as_mut().ok_or(StreamError::Closed)?;
        sink.send(chunk)
            .await
            .map_err(|e| StreamError::Write(e.to_string()))?;
        Ok(rows)
    }

    async fn finish(&mut self) -> Result<u64, StreamError> {
        let mut sink = self.sink.take().ok_or(StreamError::Closed)?;
        let rows = sink
            .as_mut()
            .finish()
            .await
            .map_err(|e| StreamError::Finish(e.to_string()))?;

        info!("COMMIT");
        self.client
            .simple_query("COMMIT")
            .await
            .map_err(|e| StreamError::Finish(e.to_string()))?;

        info!(table = %self.target, rows, "COPY committed");
        Ok(rows)
    }

    async fn discard(&mut self) -> Result<(), StreamError> {
        let Some(sink) = self.sink.take() else {
            return Ok(());
        };
        drop(sink);

        if let Err(e) = self.client.simple_query("ROLLBACK").await {
            warn!(table = %self.target, error = %e, "ROLLBACK after aborted COPY failed");
        }
        info!(table = %self.target, "COPY discarded");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.sink.is_some()
    }
}
