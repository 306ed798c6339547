//! Write routing
//!
//! Holds a cached routing table and forwards write calls to the master of
//! the owning replicaset. A failed attempt refreshes the table from the
//! steward and retries exactly once; masters that stay unreachable surface
//! as errors instead of open-ended retry loops.

use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sb_core::{bucket_for_key, ClientError, RoutingError, RoutingTable, StewardClient};
use wire::{ErrorCode, WireClient, WireError};

/// Routing failures as seen by callers
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    NoRoute(#[from] RoutingError),
    #[error("master {addr} unreachable: {source}")]
    Unreachable { addr: String, source: WireError },
    #[error("remote error ({code}): {message}")]
    Remote { code: ErrorCode, message: String },
    #[error("steward error: {0}")]
    Steward(#[from] ClientError),
}

impl RouterError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RouterError::NoRoute(_) => ErrorCode::NoRoute,
            RouterError::Unreachable { source, .. } => match source {
                WireError::Timeout => ErrorCode::Timeout,
                _ => ErrorCode::Unreachable,
            },
            RouterError::Remote { code, .. } => *code,
            RouterError::Steward(_) => ErrorCode::Internal,
        }
    }
}

/// Write router
pub struct WriteRouter {
    steward: StewardClient,
    routing: RwLock<RoutingTable>,
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl WriteRouter {
    pub fn new(steward: StewardClient, connect_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            steward,
            routing: RwLock::new(RoutingTable::new()),
            connect_timeout,
            call_timeout,
        }
    }

    pub fn routing_version(&self) -> u64 {
        self.routing.read().version
    }

    /// Install a newer routing table. Stale tables are ignored.
    pub fn update_routing(&self, table: RoutingTable) -> bool {
        let mut routing = self.routing.write();
        if table.version <= routing.version {
            return false;
        }
        debug!(
            "Routing table updated: version {} -> {}",
            routing.version, table.version
        );
        *routing = table;
        true
    }

    /// Pull the current table from the steward
    pub async fn refresh(&self) -> Result<u64, RouterError> {
        let table = self.steward.fetch_routing().await?;
        let version = table.version;
        self.update_routing(table);
        Ok(version)
    }

    fn resolve(&self, bucket: u32) -> Result<(Uuid, Uuid, String), RoutingError> {
        self.routing.read().master_for_bucket(bucket)
    }

    /// Route a write to the master owning `bucket`.
    ///
    /// On any failure short of the master itself rejecting the call, the
    /// routing table is refreshed and the call retried once against the
    /// (possibly new) master.
    pub async fn route_write(
        &self,
        bucket: u32,
        function: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, RouterError> {
        match self.try_once(bucket, function, args).await {
            Ok(value) => Ok(value),
            Err(e @ RouterError::Remote { .. }) => Err(e),
            Err(first) => {
                warn!(
                    "Write to bucket {} failed ({}), refreshing routing and retrying",
                    bucket, first
                );
                self.refresh().await?;
                self.try_once(bucket, function, args).await
            }
        }
    }

    /// Route a write by key instead of bucket
    pub async fn route_write_key(
        &self,
        key: &[u8],
        function: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, RouterError> {
        self.route_write(bucket_for_key(key), function, args).await
    }

    async fn try_once(
        &self,
        bucket: u32,
        function: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, RouterError> {
        let (replicaset, master, addr) = self.resolve(bucket)?;
        debug!(
            "Routing bucket {} to master {} of {} at {}",
            bucket, master, replicaset, addr
        );

        let mut client = WireClient::connect(&addr, self.connect_timeout)
            .await
            .map_err(|source| RouterError::Unreachable {
                addr: addr.clone(),
                source,
            })?;
        match client
            .call(bucket, function, args.to_vec(), self.call_timeout)
            .await
        {
            Ok(value) => Ok(value),
            Err(WireError::Remote { code, message }) => Err(RouterError::Remote { code, message }),
            Err(source) => Err(RouterError::Unreachable { addr, source }),
        }
    }

    /// Spawn the routing sync loop.
    ///
    /// Long-polls the steward for table changes; the steward answers early
    /// when the version moves, so failover propagates within a poll cycle.
    pub fn start_routing_sync(
        self: std::sync::Arc<Self>,
        poll_wait: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let version = self.routing_version();
                match self.steward.watch_routing(version, poll_wait).await {
                    Ok(table) => {
                        if self.update_routing(table) {
                            info!(
                                "Routing table advanced to version {}",
                                self.routing_version()
                            );
                        }
                    }
                    Err(e) => {
                        warn!("Routing watch failed: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> WriteRouter {
        let steward = StewardClient::new("http://127.0.0.1:1", Duration::from_millis(100))
            .expect("client");
        WriteRouter::new(steward, Duration::from_millis(100), Duration::from_millis(100))
    }

    fn table(version: u64) -> RoutingTable {
        let mut table = RoutingTable::new();
        table.version = version;
        table
    }

    #[test]
    fn test_update_routing_rejects_stale_versions() {
        let router = router();
        assert!(router.update_routing(table(2)));
        assert_eq!(router.routing_version(), 2);

        assert!(!router.update_routing(table(1)));
        assert!(!router.update_routing(table(2)));
        assert_eq!(router.routing_version(), 2);

        assert!(router.update_routing(table(3)));
        assert_eq!(router.routing_version(), 3);
    }

    #[test]
    fn test_resolve_without_table() {
        let router = router();
        assert!(matches!(
            router.resolve(1),
            Err(RoutingError::NoBucket(1))
        ));
    }

    #[tokio::test]
    async fn test_route_write_surfaces_no_route() {
        let router = router();
        // No routing table and no reachable steward: the refresh also fails
        let err = router.route_write(1, "get_uuid", b"null").await.unwrap_err();
        assert!(matches!(err, RouterError::Steward(_)));
    }
}
