//! In-process test cluster
//!
//! Runs a steward, storage nodes, and a router inside one tokio runtime.
//! Storage nodes are plain tasks, so killing one is an abort that leaves its
//! port refusing connections, which is exactly what the failover probe sees
//! when a real process dies.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use node::{StorageNode, WireServer};
use router::{RouterServer, WriteRouter};
use sb_core::{ApiEnvelope, NodeRole, RegisterInstance, StewardClient};
use steward::api::http::{FailoverView, ReplicasetView};
use steward::failover::FailoverConfig;
use steward::{api, Steward, StewardConfig};
use wire::WireClient;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// One storage node running as a task
pub struct NodeHandle {
    pub instance_uuid: Uuid,
    pub replicaset_uuid: Uuid,
    pub addr: String,
    server: JoinHandle<()>,
}

impl NodeHandle {
    /// Stop the node abruptly; its port starts refusing connections.
    pub fn kill(&self) {
        self.server.abort();
    }
}

/// In-process cluster
pub struct TestCluster {
    pub steward: Arc<Steward>,
    pub steward_url: String,
    pub router: Arc<WriteRouter>,
    pub router_addr: String,
    http: reqwest::Client,
    client: StewardClient,
    data_dir: PathBuf,
    tasks: Vec<JoinHandle<()>>,
}

impl TestCluster {
    pub async fn start() -> Self {
        let data_dir = std::env::temp_dir().join(format!(
            "switchboard_test_{}_{}",
            std::process::id(),
            Uuid::new_v4()
        ));

        let config = StewardConfig {
            cluster_name: "test".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            // Long heartbeat budget: test nodes do not heartbeat
            heartbeat_timeout_secs: 300,
            heartbeat_check_interval_secs: 60,
            failover: FailoverConfig {
                probe_interval_ms: 200,
                probe_timeout_ms: 200,
            },
            // Shorter than the router's poll wait, so a quiet long-poll
            // still answers before the client gives up
            watch_hold_secs: 2,
            save_interval_secs: 300,
            ..Default::default()
        };

        let steward = Arc::new(Steward::new(config).await.expect("steward should start"));
        let mut tasks = steward.start_background_tasks();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind admin api");
        let steward_url = format!("http://{}", listener.local_addr().expect("local addr"));
        {
            let steward = steward.clone();
            tasks.push(tokio::spawn(async move {
                let _ = api::serve(steward, listener).await;
            }));
        }

        let client =
            StewardClient::new(&steward_url, CALL_TIMEOUT).expect("steward client");

        // Router: registered like any other instance, fronted by the wire server
        let router = Arc::new(WriteRouter::new(
            client.clone(),
            CONNECT_TIMEOUT,
            CALL_TIMEOUT,
        ));
        let router_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind router");
        let router_addr = router_listener
            .local_addr()
            .expect("local addr")
            .to_string();
        client
            .register(&RegisterInstance {
                instance_uuid: Uuid::new_v4(),
                replicaset_uuid: Uuid::new_v4(),
                role: NodeRole::Router,
                binary_addr: router_addr.clone(),
                http_addr: None,
            })
            .await
            .expect("register router");

        tasks.push(router.clone().start_routing_sync(Duration::from_secs(5)));
        {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                RouterServer::new(router, router_listener).run().await;
            }));
        }

        Self {
            steward,
            steward_url,
            router,
            router_addr,
            http: reqwest::Client::new(),
            client,
            data_dir,
            tasks,
        }
    }

    /// Boot a storage node and register it with the steward
    pub async fn add_storage_node(&mut self, replicaset_uuid: Uuid) -> NodeHandle {
        let instance_uuid = Uuid::new_v4();
        let storage = Arc::new(StorageNode::new(instance_uuid, replicaset_uuid));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind storage node");
        let addr = listener.local_addr().expect("local addr").to_string();

        self.client
            .register(&RegisterInstance {
                instance_uuid,
                replicaset_uuid,
                role: NodeRole::Storage,
                binary_addr: addr.clone(),
                http_addr: None,
            })
            .await
            .expect("register storage node");

        let server = tokio::spawn(async move {
            WireServer::new(storage, listener).run().await;
        });

        NodeHandle {
            instance_uuid,
            replicaset_uuid,
            addr,
            server,
        }
    }

    /// Sync the router's routing table with the steward
    pub async fn refresh_router(&self) {
        self.router.refresh().await.expect("routing refresh");
    }

    /// Current master of a replicaset, via the admin API
    pub async fn get_master(&self, replicaset_uuid: Uuid) -> Option<Uuid> {
        let url = format!("{}/api/v1/replicasets/{}", self.steward_url, replicaset_uuid);
        let envelope: ApiEnvelope<ReplicasetView> = self
            .http
            .get(&url)
            .send()
            .await
            .expect("get replicaset")
            .json()
            .await
            .expect("parse replicaset");
        envelope
            .into_result()
            .expect("replicaset should exist")
            .master
            .map(|m| m.uuid)
    }

    /// Assign a master via the admin API; `Err` carries the first error message.
    pub async fn set_master(
        &self,
        replicaset_uuid: Uuid,
        instance_uuid: Uuid,
    ) -> Result<ReplicasetView, String> {
        let url = format!(
            "{}/api/v1/replicasets/{}/master",
            self.steward_url, replicaset_uuid
        );
        let envelope: ApiEnvelope<ReplicasetView> = self
            .http
            .post(&url)
            .json(&json!({ "instance_uuid": instance_uuid }))
            .send()
            .await
            .expect("set master")
            .json()
            .await
            .expect("parse set master");
        envelope.into_result().map_err(|e| match e {
            sb_core::ClientError::Api(message) => message,
            other => other.to_string(),
        })
    }

    pub async fn get_failover(&self) -> bool {
        let url = format!("{}/api/v1/cluster/failover", self.steward_url);
        let envelope: ApiEnvelope<FailoverView> = self
            .http
            .get(&url)
            .send()
            .await
            .expect("get failover")
            .json()
            .await
            .expect("parse failover");
        envelope.into_result().expect("failover flag").enabled
    }

    pub async fn set_failover(&self, enabled: bool) -> bool {
        let url = format!("{}/api/v1/cluster/failover", self.steward_url);
        let envelope: ApiEnvelope<FailoverView> = self
            .http
            .post(&url)
            .json(&json!({ "enabled": enabled }))
            .send()
            .await
            .expect("set failover")
            .json()
            .await
            .expect("parse failover");
        envelope.into_result().expect("failover flag").enabled
    }

    /// Route a write through the router's wire front-end
    pub async fn callrw(&self, function: &str) -> Result<Value, String> {
        let mut client = WireClient::connect(&self.router_addr, CONNECT_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;
        let value = client
            .call(1, function, b"null".to_vec(), CALL_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_slice(&value).map_err(|e| e.to_string())
    }

    /// `callrw("get_uuid")` parsed as a UUID, `None` while the call fails
    pub async fn current_master_via_router(&self) -> Option<Uuid> {
        let value = self.callrw("get_uuid").await.ok()?;
        value.as_str().and_then(|s| Uuid::parse_str(s).ok())
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
