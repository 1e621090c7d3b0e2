//! dualconn: TCP forwarder with priority failover.
//!
//! # Architecture Overview
//!
//! ```text
//!     client ──▶ forward (listener) ──▶ Manager::connect ──▶ target 0 (primary)
//!                                              │          └─▶ target 1..N on failure
//!                                              │
//!                       maintenance task ──────┤ recycle broken connections
//!                                              │ probe primary, fail back
//!                                              │
//!     operator ──▶ admin API (optional) ───────┘ snapshot, enable/disable
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dualconn::admin::{self, AdminState};
use dualconn::config::{read_config, validation::validate_config, DualconnConfig};
use dualconn::forward::ForwardServer;
use dualconn::lifecycle::{signals, Shutdown};
use dualconn::net::listener::Listener;
use dualconn::observability::{logging, metrics};
use dualconn::{Manager, TcpDialer};

#[derive(Parser)]
#[command(name = "dualconn")]
#[command(about = "Forward TCP connections to the highest-priority reachable target", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Targets in priority order; overrides failover.targets.
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Enable failback to the primary target.
    #[arg(long)]
    failback: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => DualconnConfig::default(),
    };
    if !cli.targets.is_empty() {
        config.failover.targets = cli.targets;
    }
    if cli.failback {
        config.failover.failback = true;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dualconn starting");

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let manager = Arc::new(Manager::new(config.failover.clone(), Arc::new(TcpDialer::new().with_nodelay(true)))?);
    let shutdown = Shutdown::new();

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            manager: Arc::clone(&manager),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        Some(tokio::spawn(admin::serve(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    let server = ForwardServer::new(Listener::bind(&config.listener).await?, Arc::clone(&manager));
    let server_task = tokio::spawn(server.run(shutdown.subscribe()));

    signals::wait_for_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger()?;

    if let Err(e) = server_task.await? {
        tracing::error!(error = %e, "Forwarding listener failed");
    }
    if let Some(task) = admin_task {
        if let Err(e) = task.await? {
            tracing::error!(error = %e, "Admin API failed");
        }
    }
    manager.shutdown().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
