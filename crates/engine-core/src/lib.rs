pub mod abort;
pub mod deadline;
pub mod error;
pub mod metrics;
pub mod queue;
