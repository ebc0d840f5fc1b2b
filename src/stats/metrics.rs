//! Statistics and metrics for the relay

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::registry::DeliveryReport;

/// Relay-wide counters, updated lock-free from the hot path
#[derive(Debug, Default)]
pub struct RelayMetrics {
    frames_relayed: AtomicU64,
    bytes_relayed: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    directory_pushes: AtomicU64,
    producers_superseded: AtomicU64,
    sessions_evicted: AtomicU64,
}

impl RelayMetrics {
    /// Create new counters, all zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one frame fanned out to a session
    pub fn record_frame(&self, len: usize, report: &DeliveryReport) {
        self.frames_relayed.fetch_add(1, Ordering::Relaxed);
        self.bytes_relayed.fetch_add(len as u64, Ordering::Relaxed);
        self.record_report(report);
    }

    /// Account for one directory push
    pub fn record_directory_push(&self, report: &DeliveryReport) {
        self.directory_pushes.fetch_add(1, Ordering::Relaxed);
        self.record_report(report);
    }

    /// Account for a producer being replaced by a newer one
    pub fn record_supersede(&self) {
        self.producers_superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for sessions removed by cleanup
    pub fn record_evictions(&self, count: usize) {
        self.sessions_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_report(&self, report: &DeliveryReport) {
        self.deliveries
            .fetch_add(report.delivered() as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            directory_pushes: self.directory_pushes.load(Ordering::Relaxed),
            producers_superseded: self.producers_superseded.load(Ordering::Relaxed),
            sessions_evicted: self.sessions_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`RelayMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Frames accepted from producers and fanned out
    pub frames_relayed: u64,
    /// Payload bytes of those frames
    pub bytes_relayed: u64,
    /// Successful per-recipient sends (frames and directory pushes)
    pub deliveries: u64,
    /// Failed per-recipient sends
    pub delivery_failures: u64,
    /// Directory pushes performed
    pub directory_pushes: u64,
    /// Producers closed because a newer one registered
    pub producers_superseded: u64,
    /// Sessions removed by idle cleanup
    pub sessions_evicted: u64,
}

/// Registry-wide statistics, served at `/stats`
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Known sessions (live and orphaned)
    pub sessions: usize,
    /// Sessions with a connected producer
    pub live_sessions: usize,
    /// Viewers not subscribed to any session
    pub pending_viewers: usize,
    /// Viewers subscribed to some session
    pub subscribed_viewers: usize,
    /// Relay counters
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConnectionId, SendError};

    #[test]
    fn test_new_is_zeroed() {
        let metrics = RelayMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_frame_counts_failures_separately() {
        let metrics = RelayMetrics::new();
        let report = DeliveryReport {
            attempted: 3,
            failures: vec![(ConnectionId(9), SendError::QueueFull)],
        };

        metrics.record_frame(1024, &report);
        metrics.record_frame(512, &DeliveryReport::default());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_relayed, 2);
        assert_eq!(snapshot.bytes_relayed, 1536);
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.delivery_failures, 1);
    }

    #[test]
    fn test_directory_push_and_supersede() {
        let metrics = RelayMetrics::new();
        metrics.record_directory_push(&DeliveryReport {
            attempted: 2,
            failures: Vec::new(),
        });
        metrics.record_supersede();
        metrics.record_evictions(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.directory_pushes, 1);
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.producers_superseded, 1);
        assert_eq!(snapshot.sessions_evicted, 3);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = RegistryStats {
            sessions: 2,
            live_sessions: 1,
            pending_viewers: 0,
            subscribed_viewers: 4,
            metrics: MetricsSnapshot::default(),
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["sessions"], 2);
        assert_eq!(json["subscribed_viewers"], 4);
        assert_eq!(json["metrics"]["frames_relayed"], 0);
    }
}
