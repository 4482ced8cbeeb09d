use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Running,
    Committed,
    Aborted,
    Failed,
}

impl PoolState {
    /// No worker or stream is left once the pool is here.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            PoolState::Committed | PoolState::Aborted | PoolState::Failed
        )
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Committed => "committed",
            PoolState::Aborted => "aborted",
            PoolState::Failed => "failed",
        };
        f.write_str(s)
    }
}
