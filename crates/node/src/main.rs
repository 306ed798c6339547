//! Storage node entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use node::config::Config;
use node::{StewardLink, StorageNode, WireServer};
use sb_core::NodeRole;

/// Storage node
#[derive(Parser, Debug)]
#[command(name = "node")]
#[command(about = "Switchboard storage node")]
struct Args {
    /// Instance UUID (generated when absent)
    #[arg(long)]
    instance_uuid: Option<Uuid>,

    /// Replicaset UUID
    #[arg(long)]
    replicaset_uuid: Option<Uuid>,

    /// Binary protocol listen address
    #[arg(short, long)]
    listen_addr: Option<String>,

    /// Steward base URL
    #[arg(long)]
    steward_addr: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Configuration file path (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Command line arguments override the file
    if let Some(uuid) = args.instance_uuid {
        config.node.instance_uuid = Some(uuid);
    }
    if let Some(uuid) = args.replicaset_uuid {
        config.node.replicaset_uuid = Some(uuid);
    }
    if let Some(addr) = args.listen_addr {
        config.network.listen_addr = addr;
    }
    if let Some(addr) = args.steward_addr {
        config.steward.steward_addr = addr;
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }

    let level = match config.log.level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let instance_uuid = config.node.instance_uuid.unwrap_or_else(Uuid::new_v4);
    let replicaset_uuid = config
        .node
        .replicaset_uuid
        .ok_or_else(|| anyhow::anyhow!("replicaset_uuid is required"))?;

    info!("Starting storage node {}", instance_uuid);
    info!("  Replicaset: {}", replicaset_uuid);
    info!("  Listen: {}", config.network.listen_addr);
    info!("  Steward: {}", config.steward.steward_addr);

    let storage_node = Arc::new(StorageNode::new(instance_uuid, replicaset_uuid));

    let listener = tokio::net::TcpListener::bind(&config.network.listen_addr).await?;
    let advertise_addr = config
        .network
        .advertise_addr
        .clone()
        .unwrap_or_else(|| listener.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| config.network.listen_addr.clone()));

    let link = Arc::new(StewardLink::new(
        &config.steward,
        instance_uuid,
        replicaset_uuid,
        NodeRole::Storage,
        advertise_addr,
    )?);

    link.register_with_retry().await;
    let _heartbeat = link.clone().start_heartbeat();

    info!("Storage node is ready");
    WireServer::new(storage_node, listener).run().await;

    Ok(())
}
