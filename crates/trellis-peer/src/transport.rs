//! The transport seam.
//!
//! The core runs over an already-established, framed, bidirectional channel.
//! The channel owns message-id assignment and reply routing; the peer client
//! only sees frames tagged as fresh inbound requests or as replies to its
//! own pending requests.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// A channel-assigned message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MsgId(pub [u8; 8]);

impl MsgId {
    /// Wrap raw id bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice, if it is exactly eight bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 8]>::try_from(bytes).ok().map(Self)
    }

    /// Generate a random id.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// The raw id bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The id as an owned vector, for protocol bodies.
    #[must_use]
    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// One inbound channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A fresh request from the remote peer.
    Request {
        /// Id replies must be addressed to.
        msg_id: MsgId,
        /// The request frame.
        frame: Vec<u8>,
    },
    /// A reply to one of our pending requests.
    Reply {
        /// Id of the request this replies to.
        msg_id: MsgId,
        /// The reply frame.
        frame: Vec<u8>,
    },
    /// The channel closed; no further events follow.
    Closed,
}

/// A framed, bidirectional message channel.
///
/// Implementations route inbound frames: frames answering an id returned by
/// [`Channel::send_request`] arrive as [`ChannelEvent::Reply`], everything
/// else as [`ChannelEvent::Request`]. A request stays in the routing table
/// until [`Channel::cancel`] removes it, so streamed replies keep arriving
/// under the same id.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send a request frame; returns the id replies will carry.
    async fn send_request(&self, frame: Vec<u8>) -> Result<MsgId>;

    /// Send a reply frame to an inbound request's id.
    async fn send_reply(&self, to: MsgId, frame: Vec<u8>) -> Result<()>;

    /// Await the next inbound event.
    async fn next_event(&self) -> ChannelEvent;

    /// Remove a pending request from the reply routing table.
    fn cancel(&self, msg_id: MsgId);

    /// Close the channel; pending requests observe [`ChannelEvent::Closed`].
    async fn close(&self);

    /// Whether the channel is closed.
    fn is_closed(&self) -> bool;
}
