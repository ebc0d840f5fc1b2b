//! Control messages exchanged with viewers

use serde::{Deserialize, Serialize};

use crate::registry::SessionId;

/// Message sent by a viewer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Switch to the named session's stream
    Subscribe {
        /// Session to receive frames from
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    /// Any message type this relay does not act on
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decode a viewer text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }
}

/// Message pushed to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// The directory of sessions a viewer may subscribe to
    SessionsUpdate(Vec<SessionId>),
}

impl ServerMessage {
    /// Encode for a text frame
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Malformed)
    }
}

/// Error decoding or encoding a control message
#[derive(Debug)]
pub enum ProtocolError {
    /// Not valid JSON, or not a shape we recognize
    Malformed(serde_json::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Malformed(e) => write!(f, "malformed message: {}", e),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Malformed(e) => Some(e),
        }
    }
}
