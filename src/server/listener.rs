//! TCP listener and server main loop

use super::connection::{
    client_writer_task, create_error_message, create_welcome_message, parse_client_message,
    ClientConnection,
};
use super::service::ChatService;
use super::session::ConnectionSession;
use crate::protocol::{
    check_version_compatibility, read_frame, ClientMessage, ServerMessage, PROTOCOL_VERSION,
};
use crate::relay::ErrorKind;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Default capacity of each connection's writer queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// TCP server listener
pub struct ServerListener {
    listener: TcpListener,
    service: Arc<ChatService>,
    outbound_buffer: usize,
}

impl ServerListener {
    /// Bind to `addr`
    pub async fn bind(addr: &str, service: Arc<ChatService>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        })
    }

    /// Set the per-connection writer queue capacity
    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Service shared by all connections
    pub fn service(&self) -> Arc<ChatService> {
        Arc::clone(&self.service)
    }

    /// Accept connections until `shutdown` is cancelled, then wait for them to close
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!("Server listening on {}", self.local_addr()?);

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Connection task failed: {}", e);
                    }
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let service = Arc::clone(&self.service);
                            let cancel = shutdown.child_token();
                            let buffer = self.outbound_buffer;
                            connections.spawn(async move {
                                if let Err(e) = handle_client(stream, service, cancel, buffer).await {
                                    tracing::error!("Client {} error: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Connection task failed: {}", e);
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Handle a single client connection
async fn handle_client(
    stream: TcpStream,
    service: Arc<ChatService>,
    cancel: CancellationToken,
    outbound_buffer: usize,
) -> Result<()> {
    let peer = stream.peer_addr()?;
    let (mut reader, writer) = stream.into_split();

    let (tx, rx) = mpsc::channel::<ServerMessage>(outbound_buffer);
    let client = ClientConnection::new(tx);
    let connection_id = client.id();

    tracing::info!("Client connected: {} ({})", connection_id, peer);

    let writer_handle = tokio::spawn(client_writer_task(writer, rx));
    client.send(create_welcome_message(connection_id)).await?;

    let mut session = ConnectionSession::new(cancel.child_token());

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Closing connection {} for shutdown", connection_id);
                break;
            }
            frame = read_frame(&mut reader) => frame,
        };

        match frame {
            Ok(Some(bytes)) => match parse_client_message(&bytes) {
                Ok(msg) => process_message(msg, &client, &service, &mut session).await,
                Err(e) => {
                    tracing::error!("Failed to parse message: {}", e);
                    let _ = client
                        .send(create_error_message(
                            ErrorKind::Protocol,
                            format!("Invalid message: {}", e),
                        ))
                        .await;
                }
            },
            Ok(None) => {
                tracing::info!("Client disconnected: {}", connection_id);
                break;
            }
            Err(e) => {
                tracing::error!("Error reading from client {}: {}", connection_id, e);
                break;
            }
        }
    }

    session.close().await;
    drop(client);
    writer_handle.abort();

    tracing::info!("Client handler finished: {}", connection_id);

    Ok(())
}

/// Process one client message
async fn process_message(
    msg: ClientMessage,
    client: &ClientConnection,
    service: &Arc<ChatService>,
    session: &mut ConnectionSession,
) {
    match msg {
        ClientMessage::Hello { protocol_version } => {
            let response = match check_version_compatibility(protocol_version, PROTOCOL_VERSION) {
                Ok(()) => ServerMessage::Ack {
                    for_command: "Hello".to_string(),
                },
                Err(e) => create_error_message(ErrorKind::Protocol, e.to_string()),
            };
            if let Err(e) = client.send(response).await {
                tracing::error!("Failed to send response: {}", e);
            }
        }

        ClientMessage::Connect { username } => {
            let Some(token) = session.begin() else {
                let message = format!(
                    "connection already has an active session as '{}'",
                    session.identity().unwrap_or_default()
                );
                let _ = client
                    .send(create_error_message(ErrorKind::Protocol, message))
                    .await;
                return;
            };

            match service.connect(&username, token) {
                Ok(admitted) => {
                    if let Err(e) = client
                        .send(ServerMessage::Connected {
                            identity: username.clone(),
                        })
                        .await
                    {
                        tracing::error!("Failed to confirm session for '{}': {}", username, e);
                    }
                    session.activate(admitted, client.clone());
                    tracing::info!("Client {} connected as '{}'", client.id(), username);
                }
                Err(e) => {
                    tracing::warn!("Rejected connect for '{}': {}", username, e);
                    session.fail();
                    let _ = client
                        .send(create_error_message(e.kind(), e.to_string()))
                        .await;
                }
            }
        }

        ClientMessage::Call {
            request_id,
            authorization,
            request,
        } => {
            let client = client.clone();
            let service = Arc::clone(service);
            tokio::spawn(async move {
                let name = request.name();
                let outcome = service.handle(authorization.as_deref(), request);
                tracing::debug!("Call {} ({}) -> {:?}", request_id, name, outcome);
                if let Err(e) = client
                    .send(ServerMessage::Reply {
                        request_id,
                        outcome,
                    })
                    .await
                {
                    tracing::error!("Failed to send reply for call {}: {}", request_id, e);
                }
            });
        }
    }
}
