//! Steward control plane service entry point

use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use steward::{api, Steward, StewardConfig};

/// Steward - cluster control plane
#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(about = "Control plane for a switchboard cluster")]
struct Args {
    /// Cluster name
    #[arg(short, long, default_value = "switchboard")]
    cluster: String,

    /// Data directory
    #[arg(short, long, default_value = "./steward_data")]
    data_dir: String,

    /// HTTP API listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    http_addr: String,

    /// Heartbeat timeout (seconds)
    #[arg(long, default_value = "30")]
    heartbeat_timeout: i64,

    /// Enable automatic failover at startup
    #[arg(long)]
    failover: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = StewardConfig {
        cluster_name: args.cluster.clone(),
        data_dir: args.data_dir.clone(),
        http_addr: args.http_addr.clone(),
        heartbeat_timeout_secs: args.heartbeat_timeout,
        ..Default::default()
    };

    info!("Starting steward...");
    info!("  Cluster: {}", config.cluster_name);
    info!("  Data dir: {}", config.data_dir);
    info!("  HTTP API: {}", config.http_addr);

    let steward = Arc::new(Steward::new(config.clone()).await?);

    if args.failover {
        steward.failover().set_enabled(true).await;
    }

    let _handles = steward.start_background_tasks();

    let stats = steward.topology().read().await.stats();
    info!(
        "Cluster ready: {} instances, {} replicasets, {} unassigned buckets",
        stats.instance_count, stats.replicaset_count, stats.unassigned_buckets
    );

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    api::serve(steward, listener).await?;

    Ok(())
}
