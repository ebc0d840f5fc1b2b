//! Best-effort concurrent delivery
//!
//! Every send is started at once and awaited together. A failing recipient
//! is recorded in the [`DeliveryReport`] and otherwise ignored: it never
//! stops delivery to the others and never becomes an error for the caller.
//! Cleanup of dead recipients is left to their own disconnect handling.

use std::future::Future;
use std::sync::Arc;

use futures::future;

use super::connection::{Connection, SendError};
use super::id::ConnectionId;

/// Per-recipient outcome of one fan-out
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Number of recipients a send was attempted for
    pub attempted: usize,
    /// Recipients whose send failed, and why
    pub failures: Vec<(ConnectionId, SendError)>,
}

impl DeliveryReport {
    /// Number of recipients that accepted the payload
    pub fn delivered(&self) -> usize {
        self.attempted - self.failures.len()
    }

    /// True when every attempted send succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run `send` against every recipient concurrently and collect the results
pub(super) async fn fan_out<'a, C, F, Fut>(recipients: &'a [Arc<C>], send: F) -> DeliveryReport
where
    C: Connection,
    F: Fn(&'a C) -> Fut,
    Fut: Future<Output = Result<(), SendError>>,
{
    let sends = recipients.iter().map(|conn| {
        let id = conn.id();
        let pending = send(conn.as_ref());
        async move { (id, pending.await) }
    });

    let results = future::join_all(sends).await;

    let mut report = DeliveryReport {
        attempted: results.len(),
        failures: Vec::new(),
    };
    for (id, result) in results {
        if let Err(e) = result {
            tracing::debug!(connection = %id, error = %e, "Delivery failed");
            report.failures.push((id, e));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::registry::mock::MockConnection;

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let healthy = Arc::new(MockConnection::new(1));
        let broken = Arc::new(MockConnection::new(2));
        broken.fail_sends();
        let recipients = vec![Arc::clone(&broken), Arc::clone(&healthy)];

        let payload = Bytes::from_static(b"frame");
        let report = fan_out(&recipients, |conn| conn.send_bytes(payload.clone())).await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failures, vec![(ConnectionId(2), SendError::Closed)]);
        assert_eq!(healthy.received_bytes(), vec![payload]);
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let recipients: Vec<Arc<MockConnection>> = Vec::new();
        let report = fan_out(&recipients, |conn| conn.send_bytes(Bytes::new())).await;

        assert_eq!(report.attempted, 0);
        assert!(report.is_clean());
    }
}
