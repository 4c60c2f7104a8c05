//! Message router - fans a message out to the live sessions of its destination

use super::{Directory, Enqueued, Message, RelayError, SessionRegistry};
use chrono::Utc;
use std::sync::Arc;

/// Per-route delivery accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose queue accepted the message
    pub delivered: usize,
    /// Recipients with no live session
    pub offline: usize,
    /// Recipients whose bounded queue was full
    pub dropped: usize,
}

/// Routes messages between sessions
#[derive(Clone)]
pub struct Router {
    registry: Arc<SessionRegistry>,
    directory: Arc<Directory>,
}

impl Router {
    pub fn new(registry: Arc<SessionRegistry>, directory: Arc<Directory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Route `body` from `sender` to the destination named `destination`.
    ///
    /// Offline recipients and full queues are skipped; the call only fails
    /// when the sender has no live session or the destination is unknown.
    pub fn route(
        &self,
        sender: &str,
        destination: &str,
        body: &str,
    ) -> Result<Delivery, RelayError> {
        if sender.is_empty() || !self.registry.contains(sender) {
            return Err(RelayError::Unauthenticated(format!(
                "'{}' has no live session",
                sender
            )));
        }

        let resolved = self.directory.resolve(destination)?;
        let msg = Message {
            sender: sender.to_string(),
            channel: resolved.destination(),
            body: body.to_string(),
            sent_at: Utc::now(),
        };

        let mut delivery = Delivery::default();
        for recipient in resolved.recipients() {
            let Some(session) = self.registry.lookup(recipient) else {
                tracing::warn!("Skipping offline recipient '{}'", recipient);
                delivery.offline += 1;
                continue;
            };

            match session.enqueue(msg.clone()) {
                Enqueued::Queued => delivery.delivered += 1,
                Enqueued::Dropped => {
                    tracing::warn!("Queue full for '{}', dropping message", recipient);
                    delivery.dropped += 1;
                }
                Enqueued::Closed => {
                    tracing::warn!("Session for '{}' closed during routing, skipping", recipient);
                    delivery.offline += 1;
                }
            }
        }

        tracing::debug!(
            "Routed message from '{}' to '{}': {} delivered, {} offline, {} dropped",
            sender,
            destination,
            delivery.delivered,
            delivery.offline,
            delivery.dropped
        );

        Ok(delivery)
    }
}
