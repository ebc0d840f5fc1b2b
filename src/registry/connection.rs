//! Transport seam consumed by the registry
//!
//! The registry never touches sockets directly. Anything that can push bytes
//! and structured messages to a peer, and close it, can be registered.

use std::future::Future;

use bytes::Bytes;

use super::id::ConnectionId;
use crate::protocol::ServerMessage;

/// Why a single send did not reach its peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The connection is closed or its writer has gone away
    Closed,
    /// The peer is not draining its outbound queue fast enough
    QueueFull,
    /// The message could not be encoded for the wire
    Encode(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Closed => write!(f, "connection closed"),
            SendError::QueueFull => write!(f, "outbound queue full"),
            SendError::Encode(reason) => write!(f, "encode failed: {}", reason),
        }
    }
}

impl std::error::Error for SendError {}

/// A bidirectional peer connection as seen by the registry
///
/// The registry only references connections for sending. Receiving is owned
/// by the connection's lifecycle loop (see [`crate::server::lifecycle`]).
pub trait Connection: Send + Sync + 'static {
    /// Stable id used for subscriber set membership
    fn id(&self) -> ConnectionId;

    /// Send a binary payload
    fn send_bytes(&self, data: Bytes) -> impl Future<Output = Result<(), SendError>> + Send;

    /// Send a structured control message
    fn send_message(
        &self,
        message: &ServerMessage,
    ) -> impl Future<Output = Result<(), SendError>> + Send;

    /// Close the connection with a status code and reason
    fn close(&self, code: u16, reason: &str) -> impl Future<Output = ()> + Send;
}
