//! Session registry - tracks which identities are currently reachable

use super::{Message, QueuePolicy, RelayError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Result of enqueueing a message onto a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Message is waiting in the session's queue
    Queued,
    /// Bounded queue was full, message discarded
    Dropped,
    /// Session has already closed
    Closed,
}

#[derive(Clone)]
enum Outbox {
    Unbounded(mpsc::UnboundedSender<Message>),
    Bounded(mpsc::Sender<Message>),
}

enum Inbox {
    Unbounded(mpsc::UnboundedReceiver<Message>),
    Bounded(mpsc::Receiver<Message>),
}

impl Inbox {
    async fn recv(&mut self) -> Option<Message> {
        match self {
            Inbox::Unbounded(rx) => rx.recv().await,
            Inbox::Bounded(rx) => rx.recv().await,
        }
    }
}

fn queue(policy: QueuePolicy) -> (Outbox, Inbox) {
    match policy {
        QueuePolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Outbox::Unbounded(tx), Inbox::Unbounded(rx))
        }
        QueuePolicy::Bounded { capacity } => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (Outbox::Bounded(tx), Inbox::Bounded(rx))
        }
    }
}

/// Cheap, cloneable reference to a live session's delivery queue
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    identity: String,
    outbox: Outbox,
    cancel: CancellationToken,
    connected_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Unique id of this session (distinguishes reconnects of one identity)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Identity owning the session
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// When the session was admitted
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Whether the session's cancellation signal has fired
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Push a message onto the session's queue without waiting
    pub fn enqueue(&self, msg: Message) -> Enqueued {
        if self.cancel.is_cancelled() {
            return Enqueued::Closed;
        }

        match &self.outbox {
            Outbox::Unbounded(tx) => match tx.send(msg) {
                Ok(()) => Enqueued::Queued,
                Err(_) => Enqueued::Closed,
            },
            Outbox::Bounded(tx) => match tx.try_send(msg) {
                Ok(()) => Enqueued::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => Enqueued::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Enqueued::Closed,
            },
        }
    }
}

/// An admitted session, owned by the connection that created it.
///
/// Dropping the session cancels it and releases its registry entry.
pub struct Session {
    handle: SessionHandle,
    inbox: Inbox,
    registry: Arc<SessionRegistry>,
}

impl Session {
    pub fn identity(&self) -> &str {
        self.handle.identity()
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Cancellation signal governing this session's lifetime
    pub fn cancel_token(&self) -> CancellationToken {
        self.handle.cancel.clone()
    }

    /// Wait for the next queued message.
    ///
    /// Returns `None` once the session is cancelled.
    pub async fn recv(&mut self) -> Option<Message> {
        tokio::select! {
            biased;
            _ = self.handle.cancel.cancelled() => None,
            msg = self.inbox.recv() => msg,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.handle.cancel.cancel();
        self.registry.release(&self.handle.identity, self.handle.id);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.handle.id)
            .field("identity", &self.handle.identity)
            .finish()
    }
}

/// Maps live identities to their sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    policy: QueuePolicy,
}

impl SessionRegistry {
    /// Create a registry whose sessions use the given queue policy
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Queue policy applied to newly admitted sessions
    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Admit a new session for `identity`.
    ///
    /// The session is cancelled when `cancel` fires; fails if the identity
    /// already has a live entry.
    pub fn admit(
        self: &Arc<Self>,
        identity: &str,
        cancel: CancellationToken,
    ) -> Result<Session, RelayError> {
        if identity.is_empty() {
            return Err(RelayError::Unauthenticated("empty identity".to_string()));
        }

        let (outbox, inbox) = queue(self.policy);
        let handle = SessionHandle {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            outbox,
            cancel,
            connected_at: Utc::now(),
        };

        {
            let mut sessions = self.write();
            if sessions.contains_key(identity) {
                return Err(RelayError::AlreadyConnected(identity.to_string()));
            }
            sessions.insert(identity.to_string(), handle.clone());
        }

        tracing::info!("Admitted session {} for '{}'", handle.id, identity);

        Ok(Session {
            handle,
            inbox,
            registry: Arc::clone(self),
        })
    }

    /// Remove the entry for `identity` and cancel its session. No-op if absent.
    pub fn remove(&self, identity: &str) {
        let removed = self.write().remove(identity);
        if let Some(handle) = removed {
            handle.cancel.cancel();
            tracing::info!("Removed session {} for '{}'", handle.id, identity);
        }
    }

    /// Look up the live session for `identity`
    pub fn lookup(&self, identity: &str) -> Option<SessionHandle> {
        self.read().get(identity).cloned()
    }

    /// Check whether `identity` has a live session
    pub fn contains(&self, identity: &str) -> bool {
        self.read().contains_key(identity)
    }

    /// Identities of all live sessions
    pub fn identities(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop the entry for `identity` only if it still belongs to session `id`
    fn release(&self, identity: &str, id: Uuid) {
        let mut sessions = self.write();
        if sessions.get(identity).map(|h| h.id) == Some(id) {
            sessions.remove(identity);
            tracing::info!("Released session {} for '{}'", id, identity);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
