//! Server module - TCP listener, connection sessions and the chat service

pub mod auth;
mod connection;
mod listener;
mod service;
mod session;

pub use connection::ClientConnection;
pub use listener::{ServerListener, DEFAULT_OUTBOUND_BUFFER};
pub use service::ChatService;
pub use session::{ConnectionSession, SessionState};
