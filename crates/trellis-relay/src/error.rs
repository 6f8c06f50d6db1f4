//! Relay error type.

use trellis_model::ModelError;
use trellis_peer::PeerError;

/// Error type for relay operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    /// The underlying peer client failed.
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// A model in transit could not be decoded or re-signed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The external signer declined or failed.
    #[error("signer: {0}")]
    Signer(String),

    /// A blob transfer could not make progress.
    #[error("blob sync: {0}")]
    BlobSync(String),
}

/// Standard Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
