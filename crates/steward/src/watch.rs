//! Routing version watch
//!
//! Lets API handlers park until the routing version moves past the version a
//! router already holds. One `Notify` per watched version, shared by every
//! waiter on that version.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tracing::debug;

/// Routing version watch registry
#[derive(Clone, Default)]
pub struct RoutingWatcher {
    waiters: Arc<RwLock<HashMap<u64, Arc<Notify>>>>,
}

impl RoutingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in any version newer than `current_version`.
    pub async fn watch(&self, current_version: u64) -> Arc<Notify> {
        let mut waiters = self.waiters.write().await;
        waiters
            .entry(current_version)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Wake every waiter holding a version older than `version`.
    pub async fn notify_version(&self, version: u64) {
        let mut waiters = self.waiters.write().await;
        let stale: Vec<u64> = waiters.keys().filter(|v| **v < version).copied().collect();
        for v in stale {
            if let Some(notify) = waiters.remove(&v) {
                debug!("Waking routing watchers at version {} (now {})", v, version);
                notify.notify_waiters();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watch_wakes_on_newer_version() {
        let watcher = RoutingWatcher::new();
        let notify = watcher.watch(3).await;

        let waiter = tokio::spawn(async move { notify.notified().await });
        // Give the waiter a chance to register
        tokio::time::sleep(Duration::from_millis(10)).await;

        watcher.notify_version(4).await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("watcher should be woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_watch_ignores_older_version() {
        let watcher = RoutingWatcher::new();
        let notify = watcher.watch(5).await;

        watcher.notify_version(5).await;

        let woken =
            tokio::time::timeout(Duration::from_millis(50), notify.notified()).await;
        assert!(woken.is_err(), "equal version must not wake watchers");
    }
}
