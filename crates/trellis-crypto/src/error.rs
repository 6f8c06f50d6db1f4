//! Crypto error type.

/// Error type for signing, verification, and key handling.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    /// A key had a length no scheme accepts.
    #[error("unsupported key length: {0} bytes")]
    KeyLength(usize),

    /// A signature had the wrong length for its scheme.
    #[error("bad signature length: expected {expected}, got {got}")]
    SignatureLength {
        /// Length the scheme requires.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// The scheme byte was not a known scheme.
    #[error("unknown signature scheme: {0}")]
    UnknownScheme(u8),

    /// A secret key did not match the expected scheme or was malformed.
    #[error("invalid secret key: {0}")]
    SecretKey(String),

    /// The supplied key pair cannot sign under the requested scheme.
    #[error("scheme mismatch: key is {key}, requested {requested}")]
    SchemeMismatch {
        /// Scheme the key belongs to.
        key: crate::Scheme,
        /// Scheme the caller asked for.
        requested: crate::Scheme,
    },
}

/// Standard Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
