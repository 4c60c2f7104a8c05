//! courier-server - relay daemon routing messages between connected users

use anyhow::Result;
use clap::Parser;
use courier::config::Config;
use courier::server::{ChatService, ServerListener};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "courier-server")]
#[command(about = "courier relay server")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Per-session queue capacity, 0 for unbounded (overrides config)
    #[arg(long)]
    queue_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    courier::logging::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(capacity) = cli.queue_capacity {
        config.server.queue_capacity = capacity;
    }

    tracing::info!(
        "Starting courier server on {} ({:?} queues, {} groups)",
        config.server.bind_addr,
        config.queue_policy(),
        config.groups.len()
    );

    let service = Arc::new(ChatService::from_config(&config)?);
    let listener = ServerListener::bind(&config.server.bind_addr, service)
        .await?
        .with_outbound_buffer(config.server.outbound_buffer);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, shutting down");
                signal_token.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    listener.run(shutdown).await
}
