//! Core types for the switchboard cluster
//!
//! Provides the pieces every role shares:
//! - Bucket to replicaset mapping
//! - Instance and replicaset metadata
//! - The routing table exchanged between the steward and the router
//! - Control-plane HTTP client used by routers and storage instances

pub mod bucket;
pub mod client;
pub mod instance;
pub mod replicaset;
pub mod retry;
pub mod routing;

// Re-export commonly used types
pub use bucket::{bucket_for_key, TOTAL_BUCKETS};
pub use client::{
    ApiEnvelope, ApiError, ClientError, RegisterInstance, RegisterOutcome, StewardClient,
};
pub use instance::{InstanceStatus, NodeInfo, NodeRole};
pub use replicaset::ReplicasetInfo;
pub use retry::{wait_until, RetryPolicy, WaitTimeout};
pub use routing::{RoutingError, RoutingTable};
