//! MJPEG view of a session
//!
//! Turns a session's latest-frame watch into a
//! `multipart/x-mixed-replace` body, so an `<img>` tag or any plain HTTP
//! client can follow a session without speaking WebSocket. Each frame is
//! sent as one `image/jpeg` part; frames are never validated.
//!
//! Only the newest frame matters here. A client that reads slower than the
//! producer writes skips the frames it missed instead of queueing them.

use bytes::{BufMut, Bytes, BytesMut};
use futures::{stream, Stream, StreamExt};
use tokio::sync::watch;

use crate::protocol::constants::MJPEG_BOUNDARY;

/// `Content-Type` of the MJPEG response
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", MJPEG_BOUNDARY)
}

/// Wrap one frame as a multipart part
pub fn encode_part(frame: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(frame.len() + MJPEG_BOUNDARY.len() + 40);
    part.put_slice(b"--");
    part.put_slice(MJPEG_BOUNDARY.as_bytes());
    part.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    part.put_slice(frame);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Parts for the current frame, if any, then for every later one
///
/// Ends when the session goes away.
pub fn mjpeg_parts(mut frames: watch::Receiver<Option<Bytes>>) -> impl Stream<Item = Bytes> {
    let current = frames.borrow_and_update().clone();

    let later = stream::unfold(frames, |mut frames| async move {
        frames.changed().await.ok()?;
        let frame = frames.borrow_and_update().clone();
        Some((frame, frames))
    });

    stream::iter([current])
        .chain(later)
        .filter_map(|frame| async move { frame.map(|f| encode_part(&f)) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_layout() {
        assert_eq!(
            &encode_part(b"\xff\xd8jpeg")[..],
            &b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xff\xd8jpeg\r\n"[..]
        );
        assert_eq!(content_type(), "multipart/x-mixed-replace; boundary=frame");
    }

    #[tokio::test]
    async fn test_parts_start_from_latest_frame() {
        let (tx, rx) = watch::channel(Some(Bytes::from_static(b"old")));
        tx.send_replace(Some(Bytes::from_static(b"current")));

        let mut parts = Box::pin(mjpeg_parts(rx));
        assert_eq!(parts.next().await, Some(encode_part(b"current")));

        tx.send_replace(Some(Bytes::from_static(b"next")));
        assert_eq!(parts.next().await, Some(encode_part(b"next")));

        drop(tx);
        assert_eq!(parts.next().await, None);
    }

    #[tokio::test]
    async fn test_no_part_until_first_frame() {
        let (tx, rx) = watch::channel(None);
        let mut parts = Box::pin(mjpeg_parts(rx));

        let waiting = tokio::time::timeout(std::time::Duration::from_millis(20), parts.next()).await;
        assert!(waiting.is_err());

        tx.send_replace(Some(Bytes::from_static(b"first")));
        assert_eq!(parts.next().await, Some(encode_part(b"first")));
    }
}
