//! Client connection handling

use crate::protocol::{deserialize, write_frame, ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::relay::{ErrorKind, RelayError};
use anyhow::Result;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Represents a connected client
#[derive(Clone)]
pub struct ClientConnection {
    /// Unique connection identifier
    id: Uuid,

    /// Channel to the connection's writer task
    sender: mpsc::Sender<ServerMessage>,
}

impl ClientConnection {
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a message for the writer task
    pub async fn send(&self, msg: ServerMessage) -> Result<(), RelayError> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| RelayError::Transport(format!("connection {} is closed", self.id)))
    }
}

/// Task to write outgoing messages to the client
pub async fn client_writer_task(
    mut writer: OwnedWriteHalf,
    mut receiver: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = receiver.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            tracing::error!("Failed to write message to client: {}", e);
            break;
        }
    }

    tracing::debug!("Client writer task finished");
}

/// Parse a client message from bytes
pub fn parse_client_message(bytes: &[u8]) -> Result<ClientMessage> {
    deserialize(bytes)
}

/// Create a welcome message for a new connection
pub fn create_welcome_message(connection_id: Uuid) -> ServerMessage {
    ServerMessage::Welcome {
        connection_id,
        protocol_version: PROTOCOL_VERSION,
    }
}

/// Create an error message
pub fn create_error_message(kind: ErrorKind, message: String) -> ServerMessage {
    ServerMessage::Error { kind, message }
}
