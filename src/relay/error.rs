//! Relay error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the relay core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("'{0}' is already connected")]
    AlreadyConnected(String),

    #[error("unknown destination '{0}'")]
    UnknownDestination(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("name '{0}' is already taken")]
    NameConflict(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl RelayError {
    /// Wire-level kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            RelayError::AlreadyConnected(_) => ErrorKind::AlreadyConnected,
            RelayError::UnknownDestination(_) => ErrorKind::UnknownDestination,
            RelayError::NotImplemented(_) => ErrorKind::NotImplemented,
            RelayError::NameConflict(_) => ErrorKind::NameConflict,
            RelayError::Transport(_) => ErrorKind::Transport,
        }
    }
}

/// Serializable error category carried in replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    AlreadyConnected,
    UnknownDestination,
    NotImplemented,
    NameConflict,
    Transport,
    /// Malformed frame or protocol misuse
    Protocol,
}
