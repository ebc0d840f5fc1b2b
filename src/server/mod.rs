//! WebSocket transport for the relay
//!
//! Producers connect to `/worker/{session_id}`, viewers to `/view`. Each
//! accepted socket becomes a [`WsConnection`] and is driven by one of the
//! loops in [`lifecycle`] until it disconnects. Plain HTTP clients can
//! follow a session's latest frame at `/mjpeg/{session_id}`.

pub mod config;
pub mod connection;
pub mod lifecycle;
pub mod listener;
pub mod mjpeg;

pub use config::ServerConfig;
pub use connection::WsConnection;
pub use listener::RelayServer;
