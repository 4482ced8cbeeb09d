pub mod reconcile;
pub mod transaction;

pub use transaction::{TransactionOrchestrator, TransactionOutcome, run_transaction};
