//! The pool coordinator: one worker per slot, partition-affine routing, and
//! the start / dispatch / commit / abort lifecycle.

pub mod coordinator;
pub mod routing;
pub mod state;

pub use coordinator::LoadPool;
pub use routing::Dispatcher;
pub use state::PoolState;
