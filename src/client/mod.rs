//! Client - programmatic access to a courier server

mod commands;

pub use commands::{format_destination, format_message, group, list, listen, send, GroupAction};

use crate::protocol::{
    check_version_compatibility, deserialize, read_frame, write_frame, ClientMessage, Outcome,
    Request, ServerMessage, PROTOCOL_VERSION,
};
use crate::relay::{Destination, ErrorKind, Message};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Outcome>>>>;

/// A call or connect rejected by the server
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct CallFailed {
    pub kind: ErrorKind,
    pub message: String,
}

/// Connection to a courier server acting as one identity
pub struct RelayClient {
    identity: String,
    connection_id: Uuid,
    writer: Mutex<OwnedWriteHalf>,
    pending: PendingCalls,
    next_request: AtomicU64,
    control: mpsc::UnboundedReceiver<ServerMessage>,
    messages: mpsc::UnboundedReceiver<Message>,
    reader: JoinHandle<()>,
}

impl RelayClient {
    /// Connect to `addr` and complete the protocol handshake.
    ///
    /// Calls made through this client carry `identity` as their authorization.
    pub async fn connect(addr: &str, identity: impl Into<String>) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;
        let (mut reader, writer) = stream.into_split();

        let welcome = read_frame(&mut reader)
            .await?
            .ok_or_else(|| anyhow!("Server closed the connection during handshake"))?;
        let connection_id = match deserialize::<ServerMessage>(&welcome)? {
            ServerMessage::Welcome {
                connection_id,
                protocol_version,
            } => {
                check_version_compatibility(PROTOCOL_VERSION, protocol_version)?;
                connection_id
            }
            other => bail!("Expected Welcome, got {:?}", other),
        };

        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let (control_tx, control) = mpsc::unbounded_channel();
        let (message_tx, messages) = mpsc::unbounded_channel();
        let reader = tokio::spawn(reader_task(
            reader,
            Arc::clone(&pending),
            control_tx,
            message_tx,
        ));

        let mut client = Self {
            identity: identity.into(),
            connection_id,
            writer: Mutex::new(writer),
            pending,
            next_request: AtomicU64::new(1),
            control,
            messages,
            reader,
        };

        client
            .write(&ClientMessage::Hello {
                protocol_version: PROTOCOL_VERSION,
            })
            .await?;
        match client.next_control().await? {
            ServerMessage::Ack { .. } => {}
            ServerMessage::Error { message, .. } => bail!("Handshake rejected: {}", message),
            other => bail!("Unexpected handshake response: {:?}", other),
        }

        Ok(client)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Server-assigned id of this connection
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Open the message stream for this client's identity
    pub async fn open_session(&mut self) -> Result<()> {
        let username = self.identity.clone();
        self.write(&ClientMessage::Connect { username }).await?;

        match self.next_control().await? {
            ServerMessage::Connected { identity } => {
                tracing::debug!("Session opened as '{}'", identity);
                Ok(())
            }
            ServerMessage::Error { kind, message } => Err(CallFailed { kind, message }.into()),
            other => bail!("Unexpected response to Connect: {:?}", other),
        }
    }

    /// Wait for the next message delivered to this session
    pub async fn next_message(&mut self) -> Option<Message> {
        self.messages.recv().await
    }

    /// Send `body` to a user or group
    pub async fn send_message(&self, receiver: &str, body: &str) -> Result<()> {
        let outcome = self
            .call(Request::SendMessage {
                receiver: receiver.to_string(),
                message: body.to_string(),
            })
            .await?;
        expect_ack(outcome)
    }

    /// Destinations visible to this identity
    pub async fn list_channels(&self) -> Result<Vec<Destination>> {
        match self.call(Request::ListChannels).await? {
            Outcome::Channels(channels) => Ok(channels),
            Outcome::Failed { kind, message } => Err(CallFailed { kind, message }.into()),
            Outcome::Ack => bail!("Expected a channel list, got Ack"),
        }
    }

    pub async fn create_group(&self, name: &str) -> Result<()> {
        let outcome = self
            .call(Request::CreateGroupChat {
                name: name.to_string(),
            })
            .await?;
        expect_ack(outcome)
    }

    pub async fn join_group(&self, name: &str) -> Result<()> {
        let outcome = self
            .call(Request::JoinGroupChat {
                name: name.to_string(),
            })
            .await?;
        expect_ack(outcome)
    }

    pub async fn leave_group(&self, name: &str) -> Result<()> {
        let outcome = self
            .call(Request::LeaveGroupChat {
                name: name.to_string(),
            })
            .await?;
        expect_ack(outcome)
    }

    /// Make a call authorized as this client's identity
    pub async fn call(&self, request: Request) -> Result<Outcome> {
        self.call_as(Some(self.identity.clone()), request).await
    }

    /// Make a call with an explicit authorization value
    pub async fn call_as(&self, authorization: Option<String>, request: Request) -> Result<Outcome> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);

        let sent = self
            .write(&ClientMessage::Call {
                request_id,
                authorization,
                request,
            })
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        rx.await
            .map_err(|_| anyhow!("Connection closed before reply to call {}", request_id))
    }

    async fn write(&self, msg: &ClientMessage) -> Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, msg).await
    }

    async fn next_control(&mut self) -> Result<ServerMessage> {
        self.control
            .recv()
            .await
            .ok_or_else(|| anyhow!("Connection closed by server"))
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn expect_ack(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Ack => Ok(()),
        Outcome::Failed { kind, message } => Err(CallFailed { kind, message }.into()),
        Outcome::Channels(_) => bail!("Expected Ack, got a channel list"),
    }
}

/// Route incoming frames to call waiters, the message stream or control replies
async fn reader_task(
    mut reader: OwnedReadHalf,
    pending: PendingCalls,
    control: mpsc::UnboundedSender<ServerMessage>,
    messages: mpsc::UnboundedSender<Message>,
) {
    loop {
        let bytes = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!("Server closed the connection");
                break;
            }
            Err(e) => {
                tracing::error!("Failed to read from server: {}", e);
                break;
            }
        };

        let msg = match deserialize::<ServerMessage>(&bytes) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!("Failed to parse server message: {}", e);
                continue;
            }
        };

        match msg {
            ServerMessage::Reply {
                request_id,
                outcome,
            } => {
                if let Some(waiter) = pending.lock().await.remove(&request_id) {
                    let _ = waiter.send(outcome);
                } else {
                    tracing::warn!("Reply for unknown call {}", request_id);
                }
            }
            ServerMessage::Delivery(message) => {
                let _ = messages.send(message);
            }
            other => {
                let _ = control.send(other);
            }
        }
    }

    pending.lock().await.clear();
}
