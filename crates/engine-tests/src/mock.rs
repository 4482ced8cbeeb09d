//! In-memory warehouse that records every session, query and load stream.

use async_trait::async_trait;
use bytes::Bytes;
use connectors::{
    error::{DbError, StreamError},
    params::ConnectionParams,
    warehouse::{LoadRequest, LoadStream, QueryResult, WarehouseClient, WarehouseConnection},
};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

/// Failure injection and latency knobs.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Sleep inside every chunk write.
    pub write_delay: Option<Duration>,
    /// Sleep inside every chunk write of one stream only.
    pub slow_stream: Option<(usize, Duration)>,
    /// Sleep inside every finish.
    pub finish_delay: Option<Duration>,
    /// Fail the `n`th write (0-based) of the given stream.
    pub fail_write: Option<(usize, usize)>,
    /// Fail opening the given stream.
    pub fail_begin_load: Option<usize>,
    /// Refuse every connection.
    pub refuse_connections: bool,
    /// Value returned by `SELECT COUNT(*)` instead of the committed rows.
    pub verified_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: usize,
    pub copy: Option<LoadRequest>,
    pub chunks: Vec<String>,
    pub rows_written: u64,
    pub open: bool,
    pub finished: bool,
    pub discarded: bool,
}

#[derive(Debug, Default)]
struct MockState {
    streams: Vec<StreamRecord>,
    queries: Vec<String>,
    connections_opened: usize,
    connections_closed: usize,
    committed_rows: u64,
}

#[derive(Clone, Default)]
pub struct MockWarehouse {
    state: Arc<Mutex<MockState>>,
    behavior: Arc<MockBehavior>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            state: Arc::default(),
            behavior: Arc::new(behavior),
        }
    }

    pub fn streams(&self) -> Vec<StreamRecord> {
        self.lock().streams.clone()
    }

    pub fn stream(&self, id: usize) -> StreamRecord {
        self.lock().streams[id].clone()
    }

    /// Ids of streams that were neither finished nor discarded.
    pub fn open_streams(&self) -> Vec<usize> {
        self.lock()
            .streams
            .iter()
            .filter(|s| s.open)
            .map(|s| s.id)
            .collect()
    }

    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.lock().connections_opened
    }

    pub fn connections_closed(&self) -> usize {
        self.lock().connections_closed
    }

    pub fn committed_rows(&self) -> u64 {
        self.lock().committed_rows
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl WarehouseClient for MockWarehouse {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn WarehouseConnection>, DbError> {
        if self.behavior.refuse_connections {
            return Err(DbError::Connect {
                endpoint: params.endpoint(),
                source: "connection refused".into(),
            });
        }
        self.lock().connections_opened += 1;
        Ok(Box::new(MockConnection {
            warehouse: self.clone(),
            closed: false,
        }))
    }
}

struct MockConnection {
    warehouse: MockWarehouse,
    closed: bool,
}

#[async_trait]
impl WarehouseConnection for MockConnection {
    async fn query(&mut self, sql: &str) -> Result<QueryResult, DbError> {
        if self.closed {
            return Err(DbError::Closed);
        }
        let mut state = self.warehouse.lock();
        state.queries.push(sql.to_string());

        if sql.starts_with("SELECT COUNT(*)") {
            let count = self
                .warehouse
                .behavior
                .verified_count
                .unwrap_or(state.committed_rows);
            return Ok(QueryResult {
                columns: vec!["count".to_string()],
                rows: vec![vec![Some(count.to_string())]],
            });
        }
        Ok(QueryResult::default())
    }

    async fn begin_load(&mut self, request: &LoadRequest) -> Result<Box<dyn LoadStream>, DbError> {
        let mut state = self.warehouse.lock();
        let id = state.streams.len();
        if self.warehouse.behavior.fail_begin_load == Some(id) {
            return Err(DbError::Query(format!("cannot open stream {id}")));
        }
        state.streams.push(StreamRecord {
            id,
            copy: Some(request.clone()),
            open: true,
            ..Default::default()
        });
        Ok(Box::new(MockStream {
            id,
            writes: 0,
            warehouse: self.warehouse.clone(),
        }))
    }

    async fn close(&mut self) -> Result<(), DbError> {
        if !self.closed {
            self.closed = true;
            self.warehouse.lock().connections_closed += 1;
        }
        Ok(())
    }
}

struct MockStream {
    id: usize,
    writes: usize,
    warehouse: MockWarehouse,
}

impl MockStream {
    fn update<T>(&self, f: impl FnOnce(&mut StreamRecord) -> T) -> T {
        let mut state = self.warehouse.lock();
        f(&mut state.streams[self.id])
    }
}

#[async_trait]
impl LoadStream for MockStream {
    async fn write(&mut self, chunk: Bytes, rows: u64) -> Result<u64, StreamError> {
        if !self.is_open() {
            return Err(StreamError::Closed);
        }
        if let Some(delay) = self.warehouse.behavior.write_delay {
            tokio::time::sleep(delay).await;
        }
        match self.warehouse.behavior.slow_stream {
            Some((id, delay)) if id == self.id => tokio::time::sleep(delay).await,
            _ => {}
        }

        let nth = self.writes;
        self.writes += 1;
        if self.warehouse.behavior.fail_write == Some((self.id, nth)) {
            return Err(StreamError::Write(format!(
                "stream {} rejected write {nth}",
                self.id
            )));
        }

        self.update(|s| {
            s.chunks.push(String::from_utf8_lossy(&chunk).into_owned());
            s.rows_written += rows;
        });
        Ok(rows)
    }

    async fn finish(&mut self) -> Result<u64, StreamError> {
        if !self.is_open() {
            return Err(StreamError::Closed);
        }
        if let Some(delay) = self.warehouse.behavior.finish_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.warehouse.lock();
        let record = &mut state.streams[self.id];
        record.open = false;
        record.finished = true;
        let rows = record.rows_written;
        state.committed_rows += rows;
        Ok(rows)
    }

    async fn discard(&mut self) -> Result<(), StreamError> {
        self.update(|s| {
            s.open = false;
            s.discarded = true;
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.update(|s| s.open)
    }
}
