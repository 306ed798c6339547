//! HTTP handlers for the admin API
//!
//! Every response is wrapped in the `{data, errors}` envelope. Mutations
//! persist the topology and wake routing watchers before replying.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

use sb_core::{ApiEnvelope, NodeInfo, RegisterInstance, RegisterOutcome, RoutingTable};

use crate::topology::{ClusterStats, TopologyError};
use crate::Steward;

/// Shared handler state
#[derive(Clone)]
pub struct AdminApi {
    steward: Arc<Steward>,
}

impl AdminApi {
    pub fn new(steward: Arc<Steward>) -> Self {
        Self { steward }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/cluster", get(get_cluster))
            .route(
                "/api/v1/cluster/failover",
                get(get_failover).post(set_failover),
            )
            .route("/api/v1/replicasets", get(list_replicasets))
            .route("/api/v1/replicasets/:uuid", get(get_replicaset))
            .route("/api/v1/replicasets/:uuid/master", post(set_master))
            .route(
                "/api/v1/instances",
                get(list_instances).post(register_instance),
            )
            .route("/api/v1/instances/:uuid/heartbeat", post(heartbeat))
            .route("/api/v1/routing", get(get_routing))
            .route("/api/v1/routing/watch", get(watch_routing))
            .with_state(self)
    }
}

/// Bind and serve the admin API until the task is dropped
pub async fn serve(steward: Arc<Steward>, listener: TcpListener) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("Admin API listening on {}", addr);
    let router = AdminApi::new(steward).router();
    axum::serve(listener, router).await
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiEnvelope::ok(data))).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiEnvelope::<()>::err(message)),
    )
        .into_response()
}

fn not_found(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiEnvelope::<()>::err(message)),
    )
        .into_response()
}

/// Cluster overview
#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterOverview {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stats: ClusterStats,
}

/// Master pointer as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterView {
    pub uuid: Uuid,
}

/// Replicaset as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicasetView {
    pub uuid: Uuid,
    pub members: Vec<Uuid>,
    pub master: Option<MasterView>,
    pub weight: u32,
}

/// Failover flag as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverView {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetFailoverRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetMasterRequest {
    pub instance_uuid: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    #[serde(default)]
    pub version: u64,
}

async fn get_cluster(State(api): State<AdminApi>) -> Response {
    let topology = api.steward.topology().read().await;
    ok(ClusterOverview {
        name: topology.name.clone(),
        created_at: topology.created_at,
        updated_at: topology.updated_at,
        stats: topology.stats(),
    })
}

async fn get_failover(State(api): State<AdminApi>) -> Response {
    let enabled = api.steward.failover().get_enabled().await;
    ok(FailoverView { enabled })
}

async fn set_failover(
    State(api): State<AdminApi>,
    Json(req): Json<SetFailoverRequest>,
) -> Response {
    let enabled = api.steward.failover().set_enabled(req.enabled).await;
    api.steward.persist().await;
    ok(FailoverView { enabled })
}

fn replicaset_view(topology: &crate::topology::ClusterTopology, uuid: &Uuid) -> Option<ReplicasetView> {
    topology.replicasets.get(uuid).map(|rs| ReplicasetView {
        uuid: rs.uuid,
        members: rs.members.iter().copied().collect(),
        master: rs.master.map(|uuid| MasterView { uuid }),
        weight: rs.weight,
    })
}

async fn list_replicasets(State(api): State<AdminApi>) -> Response {
    let topology = api.steward.topology().read().await;
    let mut views: Vec<ReplicasetView> = topology
        .replicasets
        .keys()
        .filter_map(|uuid| replicaset_view(&topology, uuid))
        .collect();
    views.sort_by_key(|v| v.uuid);
    ok(views)
}

async fn get_replicaset(State(api): State<AdminApi>, Path(uuid): Path<Uuid>) -> Response {
    let topology = api.steward.topology().read().await;
    match replicaset_view(&topology, &uuid) {
        Some(view) => ok(view),
        None => not_found(TopologyError::ReplicasetNotFound(uuid).to_string()),
    }
}

async fn set_master(
    State(api): State<AdminApi>,
    Path(uuid): Path<Uuid>,
    Json(req): Json<SetMasterRequest>,
) -> Response {
    let result = {
        let mut topology = api.steward.topology().write().await;
        topology
            .set_master(uuid, req.instance_uuid)
            .map(|_| topology.routing.version)
    };

    match result {
        Ok(version) => {
            api.steward.persist().await;
            api.steward.watcher().notify_version(version).await;
            let topology = api.steward.topology().read().await;
            match replicaset_view(&topology, &uuid) {
                Some(view) => ok(view),
                None => not_found(TopologyError::ReplicasetNotFound(uuid).to_string()),
            }
        }
        Err(e @ TopologyError::ReplicasetNotFound(_)) => not_found(e.to_string()),
        Err(e) => bad_request(e.to_string()),
    }
}

async fn list_instances(State(api): State<AdminApi>) -> Response {
    let topology = api.steward.topology().read().await;
    let mut instances: Vec<NodeInfo> = topology.instances.values().cloned().collect();
    instances.sort_by_key(|n| n.instance_uuid);
    ok(instances)
}

async fn register_instance(
    State(api): State<AdminApi>,
    Json(req): Json<RegisterInstance>,
) -> Response {
    let (is_new, version) = {
        let mut topology = api.steward.topology().write().await;
        let node = NodeInfo::new(
            req.instance_uuid,
            req.replicaset_uuid,
            req.role,
            req.binary_addr,
            req.http_addr,
        );
        let is_new = topology.register_instance(node);
        (is_new, topology.routing.version)
    };

    if is_new {
        info!("Registered new instance {}", req.instance_uuid);
    }
    api.steward.persist().await;
    api.steward.watcher().notify_version(version).await;
    ok(RegisterOutcome { is_new })
}

async fn heartbeat(State(api): State<AdminApi>, Path(uuid): Path<Uuid>) -> Response {
    if api.steward.node_manager().heartbeat(&uuid).await {
        ok(true)
    } else {
        not_found(format!("instance {} not found", uuid))
    }
}

async fn get_routing(State(api): State<AdminApi>) -> Response {
    let topology = api.steward.topology().read().await;
    ok(topology.routing.clone())
}

/// Long-poll for a routing table newer than the client's version.
///
/// Answers immediately when the steward is already ahead, otherwise parks on
/// the watch registry until the version moves or the hold timeout passes.
/// The timeout response carries the current (unchanged) table.
async fn watch_routing(State(api): State<AdminApi>, Query(query): Query<WatchQuery>) -> Response {
    let current: RoutingTable = {
        let topology = api.steward.topology().read().await;
        topology.routing.clone()
    };
    if current.version > query.version {
        return ok(current);
    }

    let notify = api.steward.watcher().watch(query.version).await;

    // A bump may have landed between the version check and registration
    {
        let topology = api.steward.topology().read().await;
        if topology.routing.version > query.version {
            return ok(topology.routing.clone());
        }
    }

    let hold = Duration::from_secs(api.steward.config().watch_hold_secs);
    let _ = tokio::time::timeout(hold, notify.notified()).await;

    let topology = api.steward.topology().read().await;
    ok(topology.routing.clone())
}
