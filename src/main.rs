//! courier - command-line client for a courier relay

use anyhow::Result;
use clap::{Parser, Subcommand};
use courier::client::{self, GroupAction};
use courier::config::Config;

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Send and receive messages through a courier relay")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Identity to act as
    #[arg(short, long)]
    user: String,

    /// Server address (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print incoming messages
    Listen,
    /// List users and groups
    List,
    /// Send a message to a user or group
    Send {
        /// Receiving user or group
        to: String,
        /// Message text
        message: String,
    },
    /// Manage group chats
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Create a group chat
    Create { name: String },
    /// Join a group chat
    Join { name: String },
    /// Leave a group chat
    Leave { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    courier::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let addr = cli.server.unwrap_or(config.client.server_addr);

    match cli.command {
        Commands::Listen => client::listen(&addr, &cli.user).await,
        Commands::List => client::list(&addr, &cli.user).await,
        Commands::Send { to, message } => client::send(&addr, &cli.user, &to, &message).await,
        Commands::Group { action } => {
            let (action, name) = match action {
                GroupCommand::Create { name } => (GroupAction::Create, name),
                GroupCommand::Join { name } => (GroupAction::Join, name),
                GroupCommand::Leave { name } => (GroupAction::Leave, name),
            };
            client::group(&addr, &cli.user, action, &name).await
        }
    }
}
