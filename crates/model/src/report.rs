use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single pool worker.
///
/// `Idle -> Running -> Finishing -> Committed`, with `Aborted` and `Failed`
/// reachable from `Running` or `Finishing`. The last three are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Running,
    Finishing,
    Committed,
    Aborted,
    Failed,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerStatus::Committed | WorkerStatus::Aborted | WorkerStatus::Failed
        )
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Running => "running",
            WorkerStatus::Finishing => "finishing",
            WorkerStatus::Committed => "committed",
            WorkerStatus::Aborted => "aborted",
            WorkerStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Produced exactly once per worker, when it reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub status: WorkerStatus,
    pub num_input_rows: u64,
    pub num_output_rows: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl WorkerReport {
    pub fn is_committed(&self) -> bool {
        self.status == WorkerStatus::Committed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionReport {
    /// Rows handed to the pool, summed over workers.
    pub num_input_rows: u64,
    /// Rows the load streams reported as written, summed over workers.
    pub num_total_rows: u64,
    /// Row count verified against the target table.
    pub num_output_rows: u64,
    pub num_rejected_rows: i64,
}

impl TransactionReport {
    pub fn from_worker_reports(reports: &[WorkerReport], verified_rows: u64) -> Self {
        let num_input_rows = reports.iter().map(|r| r.num_input_rows).sum::<u64>();
        let num_total_rows = reports.iter().map(|r| r.num_output_rows).sum::<u64>();
        Self {
            num_input_rows,
            num_total_rows,
            num_output_rows: verified_rows,
            num_rejected_rows: num_input_rows as i64 - verified_rows as i64,
        }
    }

    pub fn is_reconciled(&self) -> bool {
        self.num_input_rows == self.num_output_rows
    }
}

impl fmt::Display for TransactionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "input={} total={} output={} rejected={}",
            self.num_input_rows, self.num_total_rows, self.num_output_rows, self.num_rejected_rows
        )
    }
}
