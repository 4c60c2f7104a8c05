//! Message types for the courier protocol

use crate::relay::{Destination, ErrorKind, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Handshake with protocol version
    Hello { protocol_version: u32 },

    /// Open the message stream for `username` on this connection
    Connect { username: String },

    /// A single request/response call
    Call {
        request_id: u64,
        /// Identity asserted by the caller
        authorization: Option<String>,
        request: Request,
    },
}

/// Unary operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    SendMessage { receiver: String, message: String },
    ListChannels,
    CreateGroupChat { name: String },
    JoinGroupChat { name: String },
    LeaveGroupChat { name: String },
}

impl Request {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Request::SendMessage { .. } => "SendMessage",
            Request::ListChannels => "ListChannels",
            Request::CreateGroupChat { .. } => "CreateGroupChat",
            Request::JoinGroupChat { .. } => "JoinGroupChat",
            Request::LeaveGroupChat { .. } => "LeaveGroupChat",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent once when a connection is accepted
    Welcome {
        connection_id: Uuid,
        protocol_version: u32,
    },

    /// Session opened by `Connect`
    Connected { identity: String },

    /// A message routed to this connection's session
    Delivery(Message),

    /// Result of a `Call`
    Reply { request_id: u64, outcome: Outcome },

    /// Acknowledgment (for commands that need confirmation)
    Ack { for_command: String },

    /// Error not tied to a call
    Error { kind: ErrorKind, message: String },
}

/// Outcome of a unary call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Ack,
    Channels(Vec<Destination>),
    Failed { kind: ErrorKind, message: String },
}
