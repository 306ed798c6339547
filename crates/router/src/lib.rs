//! Stateless write router
//!
//! Resolves buckets against a cached routing table and forwards write calls
//! to the current master, retrying once through a refresh when the table
//! turns out to be stale.

pub mod router;
pub mod server;

pub use router::{RouterError, WriteRouter};
pub use server::RouterServer;
