//! Steward registration and heartbeat
//!
//! Keeps this instance registered with the control plane. A heartbeat that
//! the steward rejects (for example after the steward lost its state) triggers
//! a re-registration on the next tick.

use std::time::Duration;

use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

use sb_core::{ClientError, NodeRole, RegisterInstance, StewardClient};
use uuid::Uuid;

use crate::config::StewardConnConfig;

/// Connection between an instance and the steward
pub struct StewardLink {
    client: StewardClient,
    registration: RegisterInstance,
    heartbeat_interval: Duration,
}

impl StewardLink {
    pub fn new(
        config: &StewardConnConfig,
        instance_uuid: Uuid,
        replicaset_uuid: Uuid,
        role: NodeRole,
        binary_addr: String,
    ) -> Result<Self, ClientError> {
        let client = StewardClient::new(&config.steward_addr, config.request_timeout())?;
        Ok(Self {
            client,
            registration: RegisterInstance {
                instance_uuid,
                replicaset_uuid,
                role,
                binary_addr,
                http_addr: None,
            },
            heartbeat_interval: config.heartbeat_interval(),
        })
    }

    pub fn client(&self) -> &StewardClient {
        &self.client
    }

    /// Register, retrying until the steward answers
    pub async fn register_with_retry(&self) -> bool {
        loop {
            match self.client.register(&self.registration).await {
                Ok(outcome) => {
                    if outcome.is_new {
                        info!(
                            "Registered instance {} with steward",
                            self.registration.instance_uuid
                        );
                    } else {
                        info!(
                            "Re-registered instance {} with steward",
                            self.registration.instance_uuid
                        );
                    }
                    return outcome.is_new;
                }
                Err(e) => {
                    warn!("Registration failed, retrying: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Spawn the heartbeat loop
    pub fn start_heartbeat(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.heartbeat_interval);
            loop {
                ticker.tick().await;
                match self.client.heartbeat(self.registration.instance_uuid).await {
                    Ok(()) => debug!("Heartbeat sent"),
                    Err(ClientError::Api(message)) => {
                        // The steward no longer knows us; register again
                        warn!("Heartbeat rejected ({}), re-registering", message);
                        if let Err(e) = self.client.register(&self.registration).await {
                            warn!("Re-registration failed: {}", e);
                        }
                    }
                    Err(e) => warn!("Heartbeat failed: {}", e),
                }
            }
        })
    }
}
