//! # frame-relay
//!
//! Relays live binary streams from producing connections ("workers") to any
//! number of viewing connections, multiplexed by session id.
//!
//! - A producer connects to `/worker/{session_id}` and pushes binary frames.
//! - A viewer connects to `/view`, receives the directory of live sessions,
//!   and sends `{"type":"SUBSCRIBE","sessionId":"..."}` to pick one.
//! - Every frame a producer sends is fanned out to the session's current
//!   subscribers. A slow or dead viewer only ever degrades itself.
//!
//! The interesting state lives in [`registry::SessionRegistry`]; the
//! [`server`] module is the axum transport around it.
//!
//! ```no_run
//! use frame_relay::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> frame_relay::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{RegistryConfig, SessionId, SessionRegistry};
pub use server::{RelayServer, ServerConfig};
