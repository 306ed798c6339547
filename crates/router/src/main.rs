//! Router entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::sleep;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use router::{RouterServer, WriteRouter};
use sb_core::{NodeRole, RegisterInstance, StewardClient};

/// Write router
#[derive(Parser, Debug)]
#[command(name = "router")]
#[command(about = "Switchboard write router")]
struct Args {
    /// Instance UUID (generated when absent)
    #[arg(long)]
    instance_uuid: Option<Uuid>,

    /// Replicaset UUID of this router group
    #[arg(long)]
    replicaset_uuid: Option<Uuid>,

    /// Binary protocol listen address
    #[arg(short, long, default_value = "127.0.0.1:33000")]
    listen_addr: String,

    /// Steward base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    steward_addr: String,

    /// Steward request timeout (seconds)
    #[arg(long, default_value = "5")]
    request_timeout: u64,

    /// Call timeout towards storage nodes (seconds)
    #[arg(long, default_value = "5")]
    call_timeout: u64,

    /// Long-poll wait for routing changes (seconds)
    #[arg(long, default_value = "30")]
    watch_wait: u64,

    /// Heartbeat interval (seconds)
    #[arg(long, default_value = "10")]
    heartbeat_interval: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let instance_uuid = args.instance_uuid.unwrap_or_else(Uuid::new_v4);
    let replicaset_uuid = args.replicaset_uuid.unwrap_or_else(Uuid::new_v4);

    info!("Starting router {}", instance_uuid);
    info!("  Listen: {}", args.listen_addr);
    info!("  Steward: {}", args.steward_addr);

    let listener = tokio::net::TcpListener::bind(&args.listen_addr).await?;
    let advertise_addr = listener.local_addr()?.to_string();

    let request_timeout = Duration::from_secs(args.request_timeout);
    let steward = StewardClient::new(&args.steward_addr, request_timeout)?;

    // Register, retrying until the steward is up
    let registration = RegisterInstance {
        instance_uuid,
        replicaset_uuid,
        role: NodeRole::Router,
        binary_addr: advertise_addr,
        http_addr: None,
    };
    loop {
        match steward.register(&registration).await {
            Ok(_) => break,
            Err(e) => {
                warn!("Registration failed, retrying: {}", e);
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
    info!("Registered with steward");

    let call_timeout = Duration::from_secs(args.call_timeout);
    let write_router = Arc::new(WriteRouter::new(steward.clone(), call_timeout, call_timeout));

    // Prime the routing table before accepting traffic
    match write_router.refresh().await {
        Ok(version) => info!("Initial routing table version {}", version),
        Err(e) => warn!("Initial routing fetch failed: {}", e),
    }

    let _sync = write_router
        .clone()
        .start_routing_sync(Duration::from_secs(args.watch_wait));

    // Heartbeat loop
    let heartbeat_client = steward.clone();
    let heartbeat_interval = Duration::from_secs(args.heartbeat_interval);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = heartbeat_client.heartbeat(instance_uuid).await {
                warn!("Heartbeat failed: {}", e);
            }
        }
    });

    info!("Router is ready");
    RouterServer::new(write_router, listener).run().await;

    Ok(())
}
