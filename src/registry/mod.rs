//! Session registry for producer → viewer routing
//!
//! The registry maps session ids to one producer and a set of subscribed
//! viewers, keeps a separate set of viewers that have not subscribed yet,
//! and fans payloads out to subscribers.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SessionRegistry<C>>
//!                  ┌──────────────────────────────┐
//!                  │ sessions: HashMap<SessionId, │
//!                  │   SessionEntry {             │
//!                  │     producer: Option<C>,     │
//!                  │     subscribers: {C},        │
//!                  │   }                          │
//!                  │ >                            │
//!                  │ pending: {C}                 │
//!                  └──────────────┬───────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Producer]               [Viewer]                [Viewer]
//!    recv binary              send_bytes()            send_bytes()
//!         │                       ▲                       ▲
//!         └──► registry.relay() ──┴── fan_out (join_all) ─┘
//! ```
//!
//! # Sends never happen under the lock
//!
//! Every operation that delivers something copies its recipient list while
//! holding the lock, releases it, then sends to all recipients concurrently.
//! `bytes::Bytes` is reference counted, so each recipient shares the same
//! payload allocation.

pub mod config;
pub mod connection;
pub mod delivery;
pub mod entry;
pub mod error;
pub mod id;
pub mod store;

#[cfg(test)]
pub(crate) mod mock;

pub use config::RegistryConfig;
pub use connection::{Connection, SendError};
pub use delivery::DeliveryReport;
pub use entry::{SessionEntry, SessionState, SessionStats};
pub use error::RegistryError;
pub use id::{ConnectionId, SessionId};
pub use store::{Membership, SessionRegistry};
