//! Protocol definitions for client-server communication
//!
//! Frames are `[4-byte length BE][MessagePack payload]`.

mod message;

pub use message::{ClientMessage, Outcome, Request, ServerMessage};

use anyhow::{anyhow, bail, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum frame payload size (10 MB)
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Protocol version mismatch: client={client}, server={server}")]
    VersionMismatch { client: u32, server: u32 },

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },
}

/// Serialize a message to MessagePack bytes
pub fn serialize<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(msg)?)
}

/// Deserialize a message from MessagePack bytes
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| anyhow!(ProtocolError::MalformedMessage(e.to_string())))
}

/// Prefix a payload with its big-endian length
pub fn frame_message(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
    if len > MAX_MESSAGE_SIZE {
        bail!(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE
        });
    }

    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Read one raw frame. Returns `None` on a clean end of stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_bytes = [0u8; 4];

    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_MESSAGE_SIZE {
        bail!(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE
        });
    }

    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer).await?;

    Ok(Some(buffer))
}

/// Serialize, frame and flush one message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let framed = frame_message(&serialize(msg)?)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

/// Check if client and server protocol versions are compatible
pub fn check_version_compatibility(client_version: u32, server_version: u32) -> Result<()> {
    if client_version != server_version {
        bail!(ProtocolError::VersionMismatch {
            client: client_version,
            server: server_version
        });
    }
    Ok(())
}
