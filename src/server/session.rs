//! Connection session lifecycle - admission, delivery loop and teardown

use super::connection::ClientConnection;
use crate::protocol::ServerMessage;
use crate::relay::Session;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the session owned by one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No identity admitted yet
    Connecting,
    /// Admitted; the delivery loop is running
    Active,
    /// Admission failed or the session ended
    Closed,
}

/// The session slot of a single client connection.
///
/// A slot holds at most one live session. Once that session closes, the
/// connection may open a new one.
pub struct ConnectionSession {
    state: SessionState,
    identity: Option<String>,
    connection: CancellationToken,
    cancel: CancellationToken,
    delivery: Option<JoinHandle<()>>,
}

impl ConnectionSession {
    /// Create an empty slot whose sessions are children of `connection`
    pub fn new(connection: CancellationToken) -> Self {
        let cancel = connection.child_token();
        Self {
            state: SessionState::Connecting,
            identity: None,
            connection,
            cancel,
            delivery: None,
        }
    }

    /// Current state; an active session whose signal fired reports `Closed`
    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Active if self.cancel.is_cancelled() || self.delivery_finished() => {
                SessionState::Closed
            }
            state => state,
        }
    }

    /// Identity of the current or most recent session
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Prepare the slot for an admission and return the token to tie it to.
    ///
    /// Returns `None` while a session is still active.
    pub fn begin(&mut self) -> Option<CancellationToken> {
        match self.state() {
            SessionState::Active => None,
            SessionState::Connecting => Some(self.cancel.clone()),
            SessionState::Closed => {
                self.delivery = None;
                self.identity = None;
                self.cancel = self.connection.child_token();
                self.state = SessionState::Connecting;
                Some(self.cancel.clone())
            }
        }
    }

    /// Start delivering `session`'s queue to `client`
    pub fn activate(&mut self, session: Session, client: ClientConnection) {
        self.identity = Some(session.identity().to_string());
        self.delivery = Some(tokio::spawn(delivery_loop(session, client)));
        self.state = SessionState::Active;
    }

    /// Record a failed admission
    pub fn fail(&mut self) {
        self.cancel.cancel();
        self.state = SessionState::Closed;
    }

    /// Cancel the session and wait for its delivery loop to finish
    pub async fn close(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.delivery.take() {
            if let Err(e) = handle.await {
                tracing::error!("Delivery loop for {:?} failed: {}", self.identity, e);
            }
        }

        self.state = SessionState::Closed;
    }

    fn delivery_finished(&self) -> bool {
        self.delivery
            .as_ref()
            .map_or(false, |handle| handle.is_finished())
    }
}

/// Drain a session's queue into its connection until the session is cancelled.
///
/// Transmission errors are logged and do not end the session. The registry
/// entry is released when `session` drops at the end of the loop.
async fn delivery_loop(mut session: Session, client: ClientConnection) {
    let cancel = session.cancel_token();
    tracing::debug!("Delivery loop started for '{}'", session.identity());

    while let Some(msg) = session.recv().await {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = client.send(ServerMessage::Delivery(msg)) => {
                if let Err(e) = result {
                    tracing::error!("Failed to deliver to '{}': {}", session.identity(), e);
                }
            }
        }
    }

    tracing::debug!("Delivery loop finished for '{}'", session.identity());
}
