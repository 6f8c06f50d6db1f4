//! Peer error type.

use trellis_protocol::{ProtocolError, Status};

/// Why a response handle was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Local `cancel()` call.
    Local,
    /// The stream timed out waiting for the next element.
    Timeout,
    /// The underlying channel closed.
    Closed,
    /// The peer aborted the stream (`seq == 0`) or returned a fatal status.
    Fatal {
        /// Status the peer reported.
        status: Status,
        /// Error string the peer attached.
        error: String,
    },
    /// The accumulated response size exceeded the configured limit.
    Overflow,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "cancelled locally"),
            Self::Timeout => write!(f, "stream timeout"),
            Self::Closed => write!(f, "channel closed"),
            Self::Fatal { status, error } => write!(f, "fatal {status}: {error}"),
            Self::Overflow => write!(f, "response overflow"),
        }
    }
}

/// Error type for peer client operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PeerError {
    /// Frame or body encode/decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport failed to carry a message.
    #[error("transport: {0}")]
    Transport(String),

    /// The peer rejected the request with a status code.
    #[error("peer returned {status}: {error}")]
    Remote {
        /// Status the peer reported.
        status: Status,
        /// Error string the peer attached.
        error: String,
    },

    /// The permission layer rejected an inbound request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The operation was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(CancelReason),

    /// A handshake requirement failed.
    #[error("handshake: {0}")]
    Handshake(String),

    /// Listener registered after the handle was already cancelled.
    #[error("handle already cancelled")]
    AlreadyCancelled,
}

impl PeerError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Standard Result type for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;
