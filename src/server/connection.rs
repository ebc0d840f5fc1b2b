//! WebSocket connection adapter
//!
//! [`WsConnection`] is the registry-facing half of an accepted WebSocket.
//! Sends are non-blocking pushes into one of two queues drained by a
//! dedicated writer task, which also sends keepalive pings. Binary frames go
//! through a bounded queue; when it is full the frame is dropped for that
//! peer only. Control messages (directory updates, close) use their own
//! queue and are written ahead of pending frames, so a congested viewer
//! still learns about every directory change.
//!
//! The read half is turned into a plain stream of frames or control messages
//! by [`binary_frames`] and [`client_messages`]. Both streams end on close,
//! read error, or when the writer gives up, which is what the lifecycle loops
//! treat as disconnect.

use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message};
use bytes::Bytes;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{Connection, ConnectionId, SendError};
use crate::server::config::ServerConfig;

/// Control item queued for the writer task
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

impl Outbound {
    fn into_message(self) -> Message {
        match self {
            Outbound::Text(text) => Message::Text(text.into()),
            Outbound::Close { code, reason } => Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })),
        }
    }
}

/// Receiving ends drained by the writer task
struct Queues {
    frames: mpsc::Receiver<Bytes>,
    control: mpsc::UnboundedReceiver<Outbound>,
}

/// Registry handle for one WebSocket peer
pub struct WsConnection {
    id: ConnectionId,
    peer: SocketAddr,
    frames: mpsc::Sender<Bytes>,
    control: mpsc::UnboundedSender<Outbound>,
}

impl WsConnection {
    /// Start the writer task for `sink` and return the handle plus the
    /// writer's join handle, which completes once the peer can no longer be
    /// written to
    pub fn spawn<S>(
        id: ConnectionId,
        peer: SocketAddr,
        sink: S,
        config: &ServerConfig,
    ) -> (Self, JoinHandle<()>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display,
    {
        let (frames, frames_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let (control, control_rx) = mpsc::unbounded_channel();
        let queues = Queues {
            frames: frames_rx,
            control: control_rx,
        };
        let writer = tokio::spawn(write_loop(id, sink, queues, config.ping_interval));
        (
            Self {
                id,
                peer,
                frames,
                control,
            },
            writer,
        )
    }

    /// Remote address of the peer
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn enqueue_frame(&self, data: Bytes) -> Result<(), SendError> {
        self.frames.try_send(data).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn enqueue_control(&self, item: Outbound) -> Result<(), SendError> {
        self.control.send(item).map_err(|_| SendError::Closed)
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send_bytes(&self, data: Bytes) -> Result<(), SendError> {
        self.enqueue_frame(data)
    }

    async fn send_message(&self, message: &ServerMessage) -> Result<(), SendError> {
        let text = message
            .to_json()
            .map_err(|e| SendError::Encode(e.to_string()))?;
        self.enqueue_control(Outbound::Text(text))
    }

    async fn close(&self, code: u16, reason: &str) {
        let item = Outbound::Close {
            code,
            reason: reason.to_owned(),
        };
        if let Err(e) = self.enqueue_control(item) {
            tracing::debug!(connection = %self.id, peer = %self.peer, error = %e, "Close not queued");
        }
    }
}

async fn write_loop<S>(
    id: ConnectionId,
    mut sink: S,
    mut queues: Queues,
    ping_interval: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    // Zero disables keepalive pings
    let mut ping = (!ping_interval.is_zero())
        .then(|| tokio::time::interval_at(Instant::now() + ping_interval, ping_interval));

    loop {
        let (message, closing) = tokio::select! {
            biased;
            outbound = queues.control.recv() => match outbound {
                Some(outbound) => {
                    let closing = matches!(outbound, Outbound::Close { .. });
                    (outbound.into_message(), closing)
                }
                None => break,
            },
            frame = queues.frames.recv() => match frame {
                Some(data) => (Message::Binary(data), false),
                None => break,
            },
            _ = next_ping(&mut ping) => (Message::Ping(Bytes::new()), false),
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(connection = %id, error = %e, "WebSocket write failed");
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
    tracing::trace!(connection = %id, "Writer finished");
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

/// True while the read half is still delivering messages
fn is_open<E: Display>(message: &Result<Message, E>) -> bool {
    match message {
        Ok(Message::Close(frame)) => {
            tracing::trace!(frame = ?frame, "Peer closed");
            false
        }
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "WebSocket read failed");
            false
        }
    }
}

/// Binary payloads sent by a producer; text frames are ignored
pub fn binary_frames<S, E>(inbound: S) -> impl Stream<Item = Bytes>
where
    S: Stream<Item = Result<Message, E>>,
    E: Display,
{
    inbound
        .take_while(|message| future::ready(is_open(message)))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Binary(data)) => Some(data),
                Ok(Message::Text(_)) => {
                    tracing::trace!("Ignoring text frame from producer");
                    None
                }
                _ => None,
            })
        })
}

/// Control messages sent by a viewer; undecodable and binary frames are ignored
pub fn client_messages<S, E>(inbound: S) -> impl Stream<Item = ClientMessage>
where
    S: Stream<Item = Result<Message, E>>,
    E: Display,
{
    inbound
        .take_while(|message| future::ready(is_open(message)))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        tracing::debug!(error = %e, "Ignoring undecodable viewer message");
                        None
                    }
                },
                Ok(Message::Binary(_)) => {
                    tracing::trace!("Ignoring binary frame from viewer");
                    None
                }
                _ => None,
            })
        })
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc as sink_channel;
    use futures::stream;

    use super::*;
    use crate::registry::SessionId;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn config(capacity: usize) -> ServerConfig {
        ServerConfig::default()
            .outbound_queue_capacity(capacity)
            .ping_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_frames_keep_order_behind_control_messages() {
        let (sink, mut socket) = sink_channel::channel::<Message>(16);
        let (conn, _writer) = WsConnection::spawn(ConnectionId(1), peer(), sink, &config(16));

        conn.send_bytes(Bytes::from_static(b"\x01")).await.unwrap();
        conn.send_message(&ServerMessage::SessionsUpdate(vec![SessionId::new("room1")]))
            .await
            .unwrap();
        conn.send_bytes(Bytes::from_static(b"\x02")).await.unwrap();

        // Queued control messages are written ahead of queued frames
        assert_eq!(
            socket.next().await,
            Some(Message::Text(
                r#"{"type":"SESSIONS_UPDATE","data":["room1"]}"#.into()
            ))
        );
        assert_eq!(
            socket.next().await,
            Some(Message::Binary(Bytes::from_static(b"\x01")))
        );
        assert_eq!(
            socket.next().await,
            Some(Message::Binary(Bytes::from_static(b"\x02")))
        );
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        // The socket is never read, so the writer stalls
        let (sink, _socket) = sink_channel::channel::<Message>(0);
        let (conn, _writer) = WsConnection::spawn(ConnectionId(1), peer(), sink, &config(1));

        let mut results = Vec::new();
        for i in 0u8..10 {
            results.push(conn.send_bytes(Bytes::from(vec![i])).await);
        }

        assert!(results[0].is_ok());
        assert!(results.contains(&Err(SendError::QueueFull)));
    }

    #[tokio::test]
    async fn test_directory_update_survives_full_frame_queue() {
        let (sink, mut socket) = sink_channel::channel::<Message>(0);
        let (conn, _writer) = WsConnection::spawn(ConnectionId(1), peer(), sink, &config(1));

        let mut i = 0u8;
        while conn.send_bytes(Bytes::from(vec![i])).await.is_ok() {
            i += 1;
        }
        assert_eq!(
            conn.send_bytes(Bytes::from_static(b"dropped")).await,
            Err(SendError::QueueFull)
        );
        conn.send_message(&ServerMessage::SessionsUpdate(vec![SessionId::new("room1")]))
            .await
            .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(1), async {
            while let Some(message) = socket.next().await {
                if let Message::Text(text) = message {
                    return Some(text);
                }
            }
            None
        })
        .await
        .unwrap();
        assert_eq!(
            update.as_ref().map(|t| t.as_str()),
            Some(r#"{"type":"SESSIONS_UPDATE","data":["room1"]}"#)
        );
    }

    #[tokio::test]
    async fn test_close_sends_frame_and_stops_writer() {
        let (sink, mut socket) = sink_channel::channel::<Message>(16);
        let (conn, writer) = WsConnection::spawn(ConnectionId(1), peer(), sink, &config(16));

        conn.close(1012, "superseded by new producer").await;
        writer.await.unwrap();

        assert_eq!(
            socket.next().await,
            Some(Message::Close(Some(CloseFrame {
                code: 1012,
                reason: "superseded by new producer".into(),
            })))
        );
        assert_eq!(
            conn.send_bytes(Bytes::from_static(b"late")).await,
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn test_broken_socket_closes_connection() {
        let (sink, socket) = sink_channel::channel::<Message>(16);
        drop(socket);
        let (conn, writer) = WsConnection::spawn(ConnectionId(1), peer(), sink, &config(16));

        conn.send_bytes(Bytes::from_static(b"lost")).await.unwrap();
        writer.await.unwrap();

        assert_eq!(
            conn.send_bytes(Bytes::from_static(b"again")).await,
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn test_binary_frames_stop_at_close() {
        let inbound = stream::iter(vec![
            Ok::<_, axum::Error>(Message::Binary(Bytes::from_static(b"a"))),
            Ok(Message::Text("ignored".into())),
            Ok(Message::Binary(Bytes::from_static(b"b"))),
            Ok(Message::Close(None)),
            Ok(Message::Binary(Bytes::from_static(b"after close"))),
        ]);

        let frames: Vec<Bytes> = binary_frames(inbound).collect().await;

        assert_eq!(
            frames,
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]
        );
    }

    #[tokio::test]
    async fn test_client_messages_skip_garbage() {
        let inbound = stream::iter(vec![
            Ok::<_, axum::Error>(Message::Text("not json".into())),
            Ok(Message::Binary(Bytes::from_static(b"\x00"))),
            Ok(Message::Text(r#"{"type":"SUBSCRIBE","sessionId":"room1"}"#.into())),
            Err(axum::Error::new(std::io::Error::other("reset"))),
            Ok(Message::Text(r#"{"type":"SUBSCRIBE","sessionId":"room2"}"#.into())),
        ]);

        let messages: Vec<ClientMessage> = client_messages(inbound).collect().await;

        assert_eq!(
            messages,
            vec![ClientMessage::Subscribe {
                session_id: SessionId::new("room1")
            }]
        );
    }
}
