//! Chat service - the operations exposed to connected clients

use super::auth::caller_identity;
use crate::config::Config;
use crate::protocol::{Outcome, Request};
use crate::relay::{
    Delivery, Destination, Directory, QueuePolicy, RelayError, Router, Session, SessionRegistry,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Owns the registry, directory and router shared by all connections
pub struct ChatService {
    registry: Arc<SessionRegistry>,
    directory: Arc<Directory>,
    router: Router,
}

impl ChatService {
    /// Create a service with an empty directory
    pub fn new(policy: QueuePolicy) -> Self {
        let registry = Arc::new(SessionRegistry::new(policy));
        let directory = Arc::new(Directory::new());
        let router = Router::new(Arc::clone(&registry), Arc::clone(&directory));
        Self {
            registry,
            directory,
            router,
        }
    }

    /// Create a service from configuration, seeding the configured groups
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        let service = Self::new(config.queue_policy());
        for group in &config.groups {
            service
                .directory
                .insert_group(&group.name, group.members.iter().cloned())?;
        }
        Ok(service)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Admit a session for `username` and make it addressable.
    ///
    /// The returned session lives until `cancel` fires or it is dropped.
    pub fn connect(
        &self,
        username: &str,
        cancel: CancellationToken,
    ) -> Result<Session, RelayError> {
        let session = self.registry.admit(username, cancel)?;
        // On a name conflict the session is dropped here, releasing its entry
        self.directory.register_user(username)?;
        Ok(session)
    }

    /// Route a message on behalf of `caller`
    pub fn send_message(
        &self,
        caller: &str,
        receiver: &str,
        message: &str,
    ) -> Result<Delivery, RelayError> {
        self.router.route(caller, receiver, message)
    }

    /// Destinations visible to `caller`
    pub fn list_channels(&self, caller: &str) -> Result<Vec<Destination>, RelayError> {
        self.authenticate(caller)?;
        Ok(self.directory.list_visible_to(caller))
    }

    pub fn create_group_chat(&self, caller: &str, name: &str) -> Result<(), RelayError> {
        self.authenticate(caller)?;
        self.directory.create_group(name, caller)
    }

    pub fn join_group_chat(&self, caller: &str, name: &str) -> Result<(), RelayError> {
        self.authenticate(caller)?;
        self.directory.join_group(name, caller)
    }

    pub fn leave_group_chat(&self, caller: &str, name: &str) -> Result<(), RelayError> {
        self.authenticate(caller)?;
        self.directory.leave_group(name, caller)
    }

    /// Execute one unary call for the identity asserted by `authorization`
    pub fn handle(&self, authorization: Option<&str>, request: Request) -> Outcome {
        let result = caller_identity(authorization).and_then(|caller| match request {
            Request::SendMessage { receiver, message } => self
                .send_message(caller, &receiver, &message)
                .map(|_| Outcome::Ack),
            Request::ListChannels => self.list_channels(caller).map(Outcome::Channels),
            Request::CreateGroupChat { name } => {
                self.create_group_chat(caller, &name).map(|_| Outcome::Ack)
            }
            Request::JoinGroupChat { name } => {
                self.join_group_chat(caller, &name).map(|_| Outcome::Ack)
            }
            Request::LeaveGroupChat { name } => {
                self.leave_group_chat(caller, &name).map(|_| Outcome::Ack)
            }
        });

        result.unwrap_or_else(|e| Outcome::Failed {
            kind: e.kind(),
            message: e.to_string(),
        })
    }

    fn authenticate(&self, caller: &str) -> Result<(), RelayError> {
        if caller.is_empty() || !self.registry.contains(caller) {
            return Err(RelayError::Unauthenticated(format!(
                "'{}' has no live session",
                caller
            )));
        }
        Ok(())
    }
}
