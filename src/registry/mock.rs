//! Recording connection used by unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;

use super::connection::{Connection, SendError};
use super::id::ConnectionId;
use crate::protocol::ServerMessage;

/// Something a [`MockConnection`] was sent
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sent {
    Bytes(Bytes),
    Message(ServerMessage),
}

pub(crate) struct MockConnection {
    id: ConnectionId,
    sent: Mutex<Vec<Sent>>,
    closes: Mutex<Vec<(u16, String)>>,
    failing: AtomicBool,
    message_delay: Mutex<Option<Duration>>,
}

impl MockConnection {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id: ConnectionId(id),
            sent: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            message_delay: Mutex::new(None),
        }
    }

    /// Make every later send fail as if the peer had gone away
    pub(crate) fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Make the next `send_message` take `delay` before it lands
    pub(crate) fn delay_next_message(&self, delay: Duration) {
        *self.message_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn received_bytes(&self) -> Vec<Bytes> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Bytes(b) => Some(b),
                Sent::Message(_) => None,
            })
            .collect()
    }

    pub(crate) fn received_messages(&self) -> Vec<ServerMessage> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message(m) => Some(m),
                Sent::Bytes(_) => None,
            })
            .collect()
    }

    pub(crate) fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().unwrap().clone()
    }

    fn record(&self, item: Sent) -> Result<(), SendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        self.sent.lock().unwrap().push(item);
        Ok(())
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send_bytes(&self, data: Bytes) -> Result<(), SendError> {
        self.record(Sent::Bytes(data))
    }

    async fn send_message(&self, message: &ServerMessage) -> Result<(), SendError> {
        let delay = self.message_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(Sent::Message(message.clone()))
    }

    async fn close(&self, code: u16, reason: &str) {
        self.closes.lock().unwrap().push((code, reason.to_owned()));
    }
}
