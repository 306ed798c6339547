//! Storage node
//!
//! A storage instance serves routed function calls over the binary protocol
//! and keeps itself registered with the steward.

pub mod config;
pub mod node;
pub mod server;
pub mod steward_link;

pub use config::Config;
pub use node::{CallError, StorageNode};
pub use server::WireServer;
pub use steward_link::StewardLink;
