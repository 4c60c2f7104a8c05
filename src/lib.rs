//! courier - a real-time message relay
//!
//! This crate provides the core functionality for courier, including:
//! - Session registry, destination directory and message routing
//! - Client-server protocol
//! - Configuration management
//!
//! # Architecture
//!
//! courier uses a client-server model where:
//! - The server (`courier-server`) tracks connected identities and routes
//!   messages to users and groups
//! - The client (`courier`) opens a session, lists destinations and sends
//!   messages
//! - Communication happens over TCP with length-prefixed MessagePack frames

pub mod client;
pub mod config;
pub mod logging;
pub mod protocol;
pub mod relay;
pub mod server;
