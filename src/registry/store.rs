//! Session registry implementation
//!
//! The central registry that tracks producers and viewers per session and
//! routes frames from the former to the latter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{watch, Mutex, RwLock};

use super::config::RegistryConfig;
use super::connection::Connection;
use super::delivery::{fan_out, DeliveryReport};
use super::entry::{SessionEntry, SessionStats};
use super::error::RegistryError;
use super::id::{ConnectionId, SessionId};
use crate::protocol::constants::{CLOSE_SUPERSEDED, SUPERSEDED_REASON};
use crate::protocol::ServerMessage;
use crate::stats::{RegistryStats, RelayMetrics};

/// Where a viewer was found when it was removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    /// Connected but not subscribed to anything
    Pending,
    /// Subscribed to this session
    Session(SessionId),
}

/// State guarded by the registry lock
struct RegistryState<C> {
    sessions: HashMap<SessionId, SessionEntry<C>>,
    /// Viewers connected but not yet subscribed to any session
    pending: HashMap<ConnectionId, Arc<C>>,
}

impl<C: Connection> RegistryState<C> {
    /// Drop `viewer` from whichever set holds it. A viewer is in at most one,
    /// so the scan stops at the first hit.
    fn detach_viewer(&mut self, viewer: ConnectionId) -> Option<Membership> {
        if self.pending.remove(&viewer).is_some() {
            return Some(Membership::Pending);
        }
        self.sessions
            .iter_mut()
            .find_map(|(id, entry)| entry.remove_subscriber(viewer).then(|| id.clone()))
            .map(Membership::Session)
    }

    fn sorted_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every known viewer, subscribed or pending, without duplicates
    fn all_viewers(&self) -> Vec<Arc<C>> {
        let mut viewers: HashMap<ConnectionId, Arc<C>> = self
            .pending
            .iter()
            .map(|(id, conn)| (*id, Arc::clone(conn)))
            .collect();
        for entry in self.sessions.values() {
            for (id, conn) in &entry.subscribers {
                viewers.entry(*id).or_insert_with(|| Arc::clone(conn));
            }
        }
        viewers.into_values().collect()
    }
}

/// Central registry for all sessions
///
/// All mutations and snapshot reads go through one `RwLock`. Critical
/// sections are pure map edits; every send happens after the lock is
/// released, against a copied recipient list.
pub struct SessionRegistry<C> {
    state: RwLock<RegistryState<C>>,
    /// Held for a whole directory push so pushes reach each viewer in the
    /// order their lists were read
    directory: Mutex<()>,
    config: RegistryConfig,
    metrics: RelayMetrics,
}

impl<C: Connection> SessionRegistry<C> {
    /// Create a new session registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new session registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                sessions: HashMap::new(),
                pending: HashMap::new(),
            }),
            directory: Mutex::new(()),
            config,
            metrics: RelayMetrics::new(),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Relay counters
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Register `producer` as the source of `session_id`
    ///
    /// Creates the session if needed. An existing producer is replaced and
    /// then closed with [`CLOSE_SUPERSEDED`]. The directory is pushed to all
    /// viewers afterwards, whether or not the session is new.
    ///
    /// The new producer is installed before the old one is closed, not after.
    /// Frames the old producer sends in between are refused by
    /// [`relay`](Self::relay).
    pub async fn register_producer(&self, session_id: SessionId, producer: Arc<C>) {
        let producer_id = producer.id();

        let superseded = {
            let mut state = self.state.write().await;
            match state.sessions.get_mut(&session_id) {
                Some(entry) => {
                    tracing::info!(
                        session = %session_id,
                        producer = %producer_id,
                        subscribers = entry.subscriber_count(),
                        "Producer registered (existing session)"
                    );
                    entry.install_producer(producer)
                }
                None => {
                    state
                        .sessions
                        .insert(session_id.clone(), SessionEntry::new(producer));
                    tracing::info!(
                        session = %session_id,
                        producer = %producer_id,
                        "Producer registered (new session)"
                    );
                    None
                }
            }
        };

        if let Some(old) = superseded.filter(|old| old.id() != producer_id) {
            tracing::info!(
                session = %session_id,
                old_producer = %old.id(),
                new_producer = %producer_id,
                "Closing superseded producer"
            );
            self.metrics.record_supersede();
            old.close(CLOSE_SUPERSEDED, SUPERSEDED_REASON).await;
        }

        self.push_directory().await;
    }

    /// Forget the producer of `session_id`, keeping the session and its viewers
    ///
    /// Returns false if the session is unknown or already had no producer.
    pub async fn clear_producer(&self, session_id: &SessionId) -> bool {
        let mut state = self.state.write().await;

        let Some(entry) = state.sessions.get_mut(session_id) else {
            return false;
        };
        let cleared = entry.clear_producer();
        if cleared {
            tracing::info!(
                session = %session_id,
                subscribers = entry.subscriber_count(),
                "Producer disconnected, session kept"
            );
        }
        cleared
    }

    /// Like [`clear_producer`](Self::clear_producer), but only if `producer`
    /// is still the installed one
    ///
    /// A superseded producer calling this on its way out leaves its
    /// replacement untouched.
    pub async fn release_producer(&self, session_id: &SessionId, producer: ConnectionId) -> bool {
        let mut state = self.state.write().await;

        let Some(entry) = state.sessions.get_mut(session_id) else {
            return false;
        };
        if entry.producer_id() != Some(producer) {
            tracing::debug!(
                session = %session_id,
                current = ?entry.producer_id(),
                releasing = %producer,
                "Producer release skipped, not the installed producer"
            );
            return false;
        }

        entry.clear_producer();
        tracing::info!(
            session = %session_id,
            producer = %producer,
            subscribers = entry.subscriber_count(),
            "Producer disconnected, session kept"
        );
        true
    }

    /// Add a freshly connected viewer to the pending set and push it the directory
    pub async fn register_pending_viewer(&self, viewer: Arc<C>) {
        let viewer_id = viewer.id();
        {
            let mut state = self.state.write().await;
            state.detach_viewer(viewer_id);
            state.pending.insert(viewer_id, viewer);
        }
        tracing::debug!(viewer = %viewer_id, "Viewer connected");

        self.push_directory().await;
    }

    /// Remove a viewer from wherever it is. Not finding it is not an error.
    pub async fn remove_viewer(&self, viewer: ConnectionId) -> Option<Membership> {
        let membership = self.state.write().await.detach_viewer(viewer);

        match &membership {
            Some(Membership::Session(session_id)) => {
                tracing::info!(session = %session_id, viewer = %viewer, "Viewer left session");
            }
            Some(Membership::Pending) => {
                tracing::debug!(viewer = %viewer, "Pending viewer removed");
            }
            None => {}
        }
        membership
    }

    /// Move a viewer to `session_id`
    ///
    /// The viewer always leaves its previous set. If the session is unknown
    /// it ends up in no set at all and `SessionNotFound` is returned; viewers
    /// never create sessions.
    pub async fn subscribe_viewer(
        &self,
        viewer: Arc<C>,
        session_id: &SessionId,
    ) -> Result<(), RegistryError> {
        let viewer_id = viewer.id();
        let mut state = self.state.write().await;
        state.detach_viewer(viewer_id);

        match state.sessions.get_mut(session_id) {
            Some(entry) => {
                entry.add_subscriber(viewer);
                tracing::info!(
                    session = %session_id,
                    viewer = %viewer_id,
                    subscribers = entry.subscriber_count(),
                    "Viewer subscribed"
                );
                Ok(())
            }
            None => {
                tracing::warn!(
                    session = %session_id,
                    viewer = %viewer_id,
                    "Viewer tried to subscribe to unknown session"
                );
                Err(RegistryError::SessionNotFound(session_id.clone()))
            }
        }
    }

    /// Ids of all known sessions, sorted
    pub async fn list_session_ids(&self) -> Vec<SessionId> {
        self.state.read().await.sorted_ids()
    }

    /// Fan `payload` out to every subscriber of `session_id`
    ///
    /// Unknown sessions are a no-op. Per-recipient failures are reported,
    /// never raised, and do not remove the recipient.
    pub async fn broadcast(&self, session_id: &SessionId, payload: Bytes) -> DeliveryReport {
        let recipients = {
            let state = self.state.read().await;
            match state.sessions.get(session_id) {
                Some(entry) => {
                    entry.publish_frame(payload.clone());
                    entry.subscriber_snapshot()
                }
                None => {
                    tracing::debug!(session = %session_id, "Broadcast to unknown session");
                    return DeliveryReport::default();
                }
            }
        };

        self.deliver_frame(&recipients, payload).await
    }

    /// Broadcast on behalf of `producer`, refusing if it is no longer the
    /// session's installed producer
    pub async fn relay(
        &self,
        session_id: &SessionId,
        producer: ConnectionId,
        payload: Bytes,
    ) -> Result<DeliveryReport, RegistryError> {
        let recipients = {
            let state = self.state.read().await;
            let entry = state
                .sessions
                .get(session_id)
                .ok_or_else(|| RegistryError::SessionNotFound(session_id.clone()))?;
            if entry.producer_id() != Some(producer) {
                return Err(RegistryError::ProducerMismatch {
                    session: session_id.clone(),
                    producer,
                });
            }
            entry.publish_frame(payload.clone());
            entry.subscriber_snapshot()
        };

        Ok(self.deliver_frame(&recipients, payload).await)
    }

    async fn deliver_frame(&self, recipients: &[Arc<C>], payload: Bytes) -> DeliveryReport {
        let len = payload.len();
        let report = fan_out(recipients, |conn| conn.send_bytes(payload.clone())).await;
        self.metrics.record_frame(len, &report);
        report
    }

    /// Send the current session directory to every known viewer
    ///
    /// Pushes are serialized, so the last list a viewer receives is never
    /// older than one it received before.
    pub async fn push_directory(&self) -> DeliveryReport {
        let _push = self.directory.lock().await;
        let (ids, recipients) = {
            let state = self.state.read().await;
            (state.sorted_ids(), state.all_viewers())
        };

        tracing::info!(
            sessions = ?ids,
            recipients = recipients.len(),
            "Pushing session directory"
        );

        let message = ServerMessage::SessionsUpdate(ids);
        let report = fan_out(&recipients, |conn| conn.send_message(&message)).await;
        self.metrics.record_directory_push(&report);
        report
    }

    /// Follow the latest frame relayed on `session_id`
    ///
    /// Returns `None` for unknown sessions. The receiver closes if the
    /// session is evicted.
    pub async fn watch_frames(
        &self,
        session_id: &SessionId,
    ) -> Option<watch::Receiver<Option<Bytes>>> {
        let state = self.state.read().await;
        state.sessions.get(session_id).map(SessionEntry::watch_frames)
    }

    /// Get session statistics
    pub async fn session_stats(&self, session_id: &SessionId) -> Option<SessionStats> {
        let state = self.state.read().await;
        state.sessions.get(session_id).map(SessionEntry::stats)
    }

    /// Get total number of sessions
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Get number of viewers not subscribed to anything
    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Registry-wide statistics
    pub async fn stats(&self) -> RegistryStats {
        let state = self.state.read().await;
        RegistryStats {
            sessions: state.sessions.len(),
            live_sessions: state.sessions.values().filter(|e| e.has_producer()).count(),
            pending_viewers: state.pending.len(),
            subscribed_viewers: state.sessions.values().map(|e| e.subscriber_count()).sum(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Run cleanup once
    ///
    /// Removes sessions that have had neither producer nor subscribers for
    /// longer than `idle_session_timeout`, and pushes the directory if any
    /// were removed. Does nothing when eviction is disabled.
    pub async fn cleanup(&self) -> usize {
        let Some(timeout) = self.config.idle_session_timeout else {
            return 0;
        };

        let removed = {
            let mut state = self.state.write().await;
            let now = Instant::now();
            let before = state.sessions.len();
            state.sessions.retain(|id, entry| {
                let idle = entry.is_idle(now, timeout);
                if idle {
                    tracing::info!(session = %id, "Session removed by cleanup");
                }
                !idle
            });
            before - state.sessions.len()
        };

        if removed > 0 {
            self.metrics.record_evictions(removed);
            self.push_directory().await;
        }
        removed
    }

    /// Spawn background cleanup task
    ///
    /// Returns `None` when eviction is disabled, otherwise a handle that can
    /// be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.eviction_enabled() {
            return None;
        }

        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        }))
    }
}

impl<C: Connection> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
