//! Protocol error type.

/// Error type for frame and body encode/decode failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    /// Body serialization failed.
    #[error("serialize: {0}")]
    Serialize(String),

    /// Body deserialization failed.
    #[error("deserialize: {0}")]
    Deserialize(String),

    /// The frame's opcode is not assigned.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    /// The frame is shorter than its header.
    #[error("frame truncated")]
    Truncated,

    /// The body exceeds the decode cap.
    #[error("frame body of {0} bytes exceeds cap")]
    BodyTooLarge(usize),

    /// A field carried a value outside its domain.
    #[error("malformed: {0}")]
    Malformed(String),
}

/// Standard Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
