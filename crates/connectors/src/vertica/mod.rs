//! Vertica client built on the PostgreSQL v3 frontend protocol.
//!
//! Every session optionally pins itself to a resource pool, and a load is a
//! `COPY ... FROM STDIN ... NO COMMIT` finalized by an explicit `COMMIT` on
//! the same session.

pub mod client;
pub mod copy;
pub mod stream;

pub use client::{VerticaClient, VerticaConnection};
pub use stream::CopyStream;
