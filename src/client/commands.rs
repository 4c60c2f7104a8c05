//! Command-line actions backed by [`RelayClient`](super::RelayClient)

use super::RelayClient;
use crate::relay::{Destination, DestinationKind, Message};
use anyhow::Result;

/// Group management actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    Create,
    Join,
    Leave,
}

/// Render an incoming message for the terminal
pub fn format_message(msg: &Message) -> String {
    let from = match msg.channel.kind {
        DestinationKind::User => format!("@{}", msg.sender),
        DestinationKind::Group => format!("group {} (@{})", msg.channel.name, msg.sender),
    };
    format!(
        "[{}] {}: {}",
        msg.sent_at.format("%H:%M:%S"),
        from,
        msg.body
    )
}

/// Render one directory entry
pub fn format_destination(destination: &Destination) -> String {
    format!("- {} ({})", destination.name, destination.kind)
}

/// Open a session and print messages until interrupted
pub async fn listen(addr: &str, user: &str) -> Result<()> {
    let mut client = RelayClient::connect(addr, user).await?;
    client.open_session().await?;
    println!("Connected as {}. Press Ctrl-C to quit.", user);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing session");
                break;
            }
            msg = client.next_message() => match msg {
                Some(msg) => println!("{}", format_message(&msg)),
                None => {
                    println!("Server closed the connection");
                    break;
                }
            },
        }
    }

    Ok(())
}

/// Print the destinations visible to `user`
pub async fn list(addr: &str, user: &str) -> Result<()> {
    let client = RelayClient::connect(addr, user).await?;
    let mut channels = client.list_channels().await?;
    channels.sort_by(|a, b| a.name.cmp(&b.name));

    if channels.is_empty() {
        println!("No other users or groups");
    }
    for channel in &channels {
        println!("{}", format_destination(channel));
    }

    Ok(())
}

/// Send one message as `user`, who must have a live session
pub async fn send(addr: &str, user: &str, to: &str, body: &str) -> Result<()> {
    let client = RelayClient::connect(addr, user).await?;
    client.send_message(to, body).await?;
    println!("Message sent");
    Ok(())
}

/// Run a group management action as `user`
pub async fn group(addr: &str, user: &str, action: GroupAction, name: &str) -> Result<()> {
    let client = RelayClient::connect(addr, user).await?;
    match action {
        GroupAction::Create => client.create_group(name).await,
        GroupAction::Join => client.join_group(name).await,
        GroupAction::Leave => client.leave_group(name).await,
    }
}
