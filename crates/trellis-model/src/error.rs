//! Model error type.

use trellis_codec::CodecError;
use trellis_crypto::CryptoError;

/// Error type for model construction, validation, and signing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Malformed packed bytes.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Key or signature handling failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A semantic invariant does not hold.
    #[error("validation: {0}")]
    Validation(String),

    /// Field 0 does not carry a known model-type tuple.
    #[error("unknown model type {0}")]
    UnknownModelType(String),

    /// A mutating operation on a model that is already packed.
    #[error("model is frozen (already packed)")]
    Frozen,

    /// An operation that needs the packed form before `pack()` was called.
    #[error("model is not packed yet")]
    NotPacked,

    /// All three signature slots are occupied.
    #[error("no free signature slot")]
    SignatureSlotsFull,

    /// The work proof does not satisfy the declared difficulty.
    #[error("work proof invalid: {0}")]
    Work(String),
}

impl ModelError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Standard Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
