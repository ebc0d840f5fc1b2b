//! Connection lifecycles
//!
//! Producer: register → relay every frame → release on disconnect.
//! Viewer: register pending → follow SUBSCRIBE requests → remove on disconnect.
//!
//! Both loops are transport-agnostic; the inbound side is any stream that
//! ends when the peer goes away.

use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::protocol::ClientMessage;
use crate::registry::{Connection, RegistryError, SessionId, SessionRegistry};

/// Drive a producer connection until its frame stream ends
///
/// Stops early if another producer takes over the session.
pub async fn run_producer<C, S>(
    registry: &SessionRegistry<C>,
    session_id: SessionId,
    producer: Arc<C>,
    frames: S,
) where
    C: Connection,
    S: Stream<Item = Bytes>,
{
    let producer_id = producer.id();
    registry.register_producer(session_id.clone(), producer).await;

    let mut frames = pin!(frames);
    while let Some(frame) = frames.next().await {
        match registry.relay(&session_id, producer_id, frame).await {
            Ok(_) => {}
            Err(RegistryError::ProducerMismatch { .. }) => {
                tracing::info!(
                    session = %session_id,
                    producer = %producer_id,
                    "Producer superseded, stopping relay"
                );
                break;
            }
            Err(e) => {
                tracing::warn!(session = %session_id, producer = %producer_id, error = %e, "Relay stopped");
                break;
            }
        }
    }

    registry.release_producer(&session_id, producer_id).await;
}

/// Drive a viewer connection until its message stream ends
pub async fn run_viewer<C, S>(registry: &SessionRegistry<C>, viewer: Arc<C>, messages: S)
where
    C: Connection,
    S: Stream<Item = ClientMessage>,
{
    let viewer_id = viewer.id();
    registry.register_pending_viewer(Arc::clone(&viewer)).await;

    let mut messages = pin!(messages);
    while let Some(message) = messages.next().await {
        match message {
            ClientMessage::Subscribe { session_id } if !session_id.is_empty() => {
                if let Err(e) = registry
                    .subscribe_viewer(Arc::clone(&viewer), &session_id)
                    .await
                {
                    tracing::debug!(viewer = %viewer_id, error = %e, "Subscribe had no target");
                }
            }
            ClientMessage::Subscribe { .. } => {
                tracing::debug!(viewer = %viewer_id, "Ignoring subscribe without session id");
            }
            ClientMessage::Unknown => {
                tracing::trace!(viewer = %viewer_id, "Ignoring unknown message type");
            }
        }
    }

    registry.remove_viewer(viewer_id).await;
}
