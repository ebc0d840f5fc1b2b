//! Session entry and state types
//!
//! This module defines the per-session state stored in the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::watch;

use super::connection::Connection;
use super::id::ConnectionId;

/// State of a session entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session has a connected producer
    Live,
    /// Producer disconnected; the session keeps its id and subscribers
    Orphaned,
}

/// Entry for a single session in the registry
pub struct SessionEntry<C> {
    /// Current producer (None after the producer disconnects)
    pub(super) producer: Option<Arc<C>>,

    /// Viewers receiving this session's frames
    pub(super) subscribers: HashMap<ConnectionId, Arc<C>>,

    /// When the session was first registered
    pub created_at: Instant,

    /// When the producer last went away
    pub producer_disconnected_at: Option<Instant>,

    /// Most recent frame, for watchers that only want the latest one
    latest_frame: watch::Sender<Option<Bytes>>,
}

impl<C: Connection> SessionEntry<C> {
    /// Create an entry owned by `producer`
    pub(super) fn new(producer: Arc<C>) -> Self {
        Self {
            producer: Some(producer),
            subscribers: HashMap::new(),
            created_at: Instant::now(),
            producer_disconnected_at: None,
            latest_frame: watch::Sender::new(None),
        }
    }

    /// Id of the installed producer, if any
    pub fn producer_id(&self) -> Option<ConnectionId> {
        self.producer.as_ref().map(|p| p.id())
    }

    /// Check if the session has a connected producer
    pub fn has_producer(&self) -> bool {
        self.producer.is_some()
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        if self.has_producer() {
            SessionState::Live
        } else {
            SessionState::Orphaned
        }
    }

    /// Install a producer, returning the one it replaced
    pub(super) fn install_producer(&mut self, producer: Arc<C>) -> Option<Arc<C>> {
        self.producer_disconnected_at = None;
        self.producer.replace(producer)
    }

    /// Drop the producer reference. Returns false if there was none.
    pub(super) fn clear_producer(&mut self) -> bool {
        if self.producer.take().is_some() {
            self.producer_disconnected_at = Some(Instant::now());
            true
        } else {
            false
        }
    }

    pub(super) fn add_subscriber(&mut self, viewer: Arc<C>) {
        self.subscribers.insert(viewer.id(), viewer);
    }

    pub(super) fn remove_subscriber(&mut self, viewer: ConnectionId) -> bool {
        self.subscribers.remove(&viewer).is_some()
    }

    /// Remember `frame` as the latest one and wake its watchers
    pub(super) fn publish_frame(&self, frame: Bytes) {
        self.latest_frame.send_replace(Some(frame));
    }

    /// Follow the latest frame. The receiver ends when the entry is dropped.
    pub(super) fn watch_frames(&self) -> watch::Receiver<Option<Bytes>> {
        self.latest_frame.subscribe()
    }

    /// Copy of the subscriber set, safe to iterate after the lock is released
    pub(super) fn subscriber_snapshot(&self) -> Vec<Arc<C>> {
        self.subscribers.values().cloned().collect()
    }

    /// Whether the session has been empty and producer-less for longer than `timeout`
    pub(super) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        if self.has_producer() || !self.subscribers.is_empty() {
            return false;
        }
        let since = self.producer_disconnected_at.unwrap_or(self.created_at);
        now.duration_since(since) > timeout
    }

    /// Snapshot of this entry's statistics
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.state(),
            has_producer: self.has_producer(),
            subscriber_count: self.subscriber_count(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Current session state
    pub state: SessionState,
    /// Whether the session has a connected producer
    pub has_producer: bool,
    /// Number of subscribed viewers
    pub subscriber_count: usize,
    /// Time since the session was created
    pub age: Duration,
}
