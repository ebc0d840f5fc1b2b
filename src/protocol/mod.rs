//! Relay wire protocol
//!
//! Control traffic is JSON in WebSocket text frames. Session payloads travel
//! untouched in binary frames and have no representation here.

pub mod constants;
pub mod message;

pub use message::{ClientMessage, ProtocolError, ServerMessage};
