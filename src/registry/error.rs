//! Registry error types
//!
//! Error types for session registry operations.

use super::id::{ConnectionId, SessionId};

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Session not found
    SessionNotFound(SessionId),
    /// Caller is not the session's installed producer
    ProducerMismatch {
        /// Session the caller tried to publish into
        session: SessionId,
        /// The caller's connection
        producer: ConnectionId,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::SessionNotFound(id) => write!(f, "Session not found: {}", id),
            RegistryError::ProducerMismatch { session, producer } => {
                write!(f, "{} is not the producer of session {}", producer, session)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
