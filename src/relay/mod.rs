//! Relay core - session registry, destination directory and message router
//!
//! Control flow for one message:
//! 1. The router checks that the sender owns a live session in the
//!    [`SessionRegistry`].
//! 2. The destination name is resolved through the [`Directory`].
//! 3. A [`Message`] is enqueued onto every reachable recipient's queue;
//!    offline recipients are skipped.

mod directory;
mod error;
mod registry;
mod router;

pub use directory::{Directory, Resolved};
pub use error::{ErrorKind, RelayError};
pub use registry::{Enqueued, Session, SessionHandle, SessionRegistry};
pub use router::{Delivery, Router};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an addressable destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationKind {
    /// A single user, addressed by identity
    User,
    /// A named set of users
    Group,
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationKind::User => write!(f, "user"),
            DestinationKind::Group => write!(f, "group"),
        }
    }
}

/// Destination snapshot: what a message was addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub kind: DestinationKind,
    pub name: String,
}

impl Destination {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: DestinationKind::User,
            name: name.into(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: DestinationKind::Group,
            name: name.into(),
        }
    }
}

/// A routed text message as seen by its recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the sender
    pub sender: String,

    /// Destination captured at send time
    pub channel: Destination,

    /// Message text
    pub body: String,

    /// When the router accepted the message
    pub sent_at: DateTime<Utc>,
}

/// How a session's outbound queue behaves when its consumer stalls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Never blocks and never drops; memory grows with a stalled recipient
    #[default]
    Unbounded,
    /// Holds at most `capacity` messages; further messages are dropped and counted
    Bounded { capacity: usize },
}

impl QueuePolicy {
    /// Build a policy from a configured capacity, where 0 means unbounded
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            QueuePolicy::Unbounded
        } else {
            QueuePolicy::Bounded { capacity }
        }
    }
}
