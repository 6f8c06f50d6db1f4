//! In-memory channel pair.
//!
//! Two [`MemChannel`]s connected back to back, with the reply-routing
//! behavior the [`Channel`] contract requires: a frame sent as a reply is
//! routed to the originator's pending table; replies to cancelled ids are
//! dropped; everything else surfaces as a fresh request.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use trellis_peer::{Channel, ChannelEvent, MsgId, PeerError, Result};

enum Wire {
    Frame {
        msg_id: MsgId,
        frame: Vec<u8>,
        is_reply: bool,
    },
    Close,
}

/// One side of an in-memory channel pair.
pub struct MemChannel {
    to_peer: mpsc::UnboundedSender<Wire>,
    from_peer: tokio::sync::Mutex<mpsc::UnboundedReceiver<Wire>>,
    pending: Mutex<HashSet<MsgId>>,
    closed: AtomicBool,
}

/// Create a connected channel pair.
#[must_use]
pub fn channel_pair() -> (Arc<MemChannel>, Arc<MemChannel>) {
    let (tx_a, rx_a) = mpsc::unbounded_channel();
    let (tx_b, rx_b) = mpsc::unbounded_channel();
    let a = Arc::new(MemChannel {
        to_peer: tx_b,
        from_peer: tokio::sync::Mutex::new(rx_a),
        pending: Mutex::new(HashSet::new()),
        closed: AtomicBool::new(false),
    });
    let b = Arc::new(MemChannel {
        to_peer: tx_a,
        from_peer: tokio::sync::Mutex::new(rx_b),
        pending: Mutex::new(HashSet::new()),
        closed: AtomicBool::new(false),
    });
    (a, b)
}

#[async_trait]
impl Channel for MemChannel {
    async fn send_request(&self, frame: Vec<u8>) -> Result<MsgId> {
        if self.is_closed() {
            return Err(PeerError::transport("channel closed"));
        }
        let msg_id = MsgId::random();
        self.pending.lock().insert(msg_id);
        self.to_peer
            .send(Wire::Frame {
                msg_id,
                frame,
                is_reply: false,
            })
            .map_err(|_| PeerError::transport("peer gone"))?;
        Ok(msg_id)
    }

    async fn send_reply(&self, to: MsgId, frame: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(PeerError::transport("channel closed"));
        }
        self.to_peer
            .send(Wire::Frame {
                msg_id: to,
                frame,
                is_reply: true,
            })
            .map_err(|_| PeerError::transport("peer gone"))
    }

    async fn next_event(&self) -> ChannelEvent {
        loop {
            let wire = self.from_peer.lock().await.recv().await;
            match wire {
                None | Some(Wire::Close) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return ChannelEvent::Closed;
                }
                Some(Wire::Frame {
                    msg_id,
                    frame,
                    is_reply,
                }) => {
                    if is_reply {
                        if self.pending.lock().contains(&msg_id) {
                            return ChannelEvent::Reply { msg_id, frame };
                        }
                        // Reply to a cancelled request: dropped.
                        continue;
                    }
                    return ChannelEvent::Request { msg_id, frame };
                }
            }
        }
    }

    fn cancel(&self, msg_id: MsgId) {
        self.pending.lock().remove(&msg_id);
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.to_peer.send(Wire::Close);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_reply_round_trip() {
        let (a, b) = channel_pair();

        let msg_id = a.send_request(b"ping".to_vec()).await.unwrap();
        match b.next_event().await {
            ChannelEvent::Request { msg_id: got, frame } => {
                assert_eq!(got, msg_id);
                assert_eq!(frame, b"ping");
                b.send_reply(got, b"pong".to_vec()).await.unwrap();
            }
            other => panic!("unexpected event {other:?}"),
        }
        match a.next_event().await {
            ChannelEvent::Reply { msg_id: got, frame } => {
                assert_eq!(got, msg_id);
                assert_eq!(frame, b"pong");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_requests_drop_replies() {
        let (a, b) = channel_pair();
        let msg_id = a.send_request(b"ping".to_vec()).await.unwrap();
        a.cancel(msg_id);
        b.send_reply(msg_id, b"late".to_vec()).await.unwrap();
        // A later request must surface, skipping the dropped reply.
        let second = a.send_request(b"x".to_vec()).await.unwrap();
        let ChannelEvent::Request { .. } = b.next_event().await else {
            panic!("expected request");
        };
        let ChannelEvent::Request { .. } = b.next_event().await else {
            panic!("expected request");
        };
        b.send_reply(second, b"ok".to_vec()).await.unwrap();
        match a.next_event().await {
            ChannelEvent::Reply { msg_id: got, .. } => assert_eq!(got, second),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_propagates() {
        let (a, b) = channel_pair();
        a.close().await;
        assert!(a.is_closed());
        assert!(matches!(b.next_event().await, ChannelEvent::Closed));
    }
}
