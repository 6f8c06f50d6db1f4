//! Signature scheme identification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, Result};

/// Public-key length of the Edwards scheme.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;
/// Public-key (address) length of the signed-message scheme.
pub const ETHSIGN_PUBLIC_KEY_LEN: usize = 20;
/// Signature length of the Edwards scheme.
pub const ED25519_SIGNATURE_LEN: usize = 64;
/// Signature length of the signed-message scheme (`r || s || v`).
pub const ETHSIGN_SIGNATURE_LEN: usize = 65;

/// The two signature schemes a model signature may carry.
///
/// The discriminant is the wire value stored in a signature object's `type`
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Scheme {
    /// Detached Ed25519 over the raw message.
    Ed25519 = 0,
    /// Recoverable secp256k1 ECDSA over the Keccak-256 signed-message digest.
    EthSign = 1,
}

impl Scheme {
    /// Wire byte for this scheme.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Ed25519),
            1 => Ok(Self::EthSign),
            other => Err(CryptoError::UnknownScheme(other)),
        }
    }

    /// Auto-detect the scheme from a public-key length.
    pub fn detect(public_key: &[u8]) -> Result<Self> {
        match public_key.len() {
            ED25519_PUBLIC_KEY_LEN => Ok(Self::Ed25519),
            ETHSIGN_PUBLIC_KEY_LEN => Ok(Self::EthSign),
            other => Err(CryptoError::KeyLength(other)),
        }
    }

    /// Signature length this scheme produces.
    #[must_use]
    pub fn signature_length(self) -> usize {
        match self {
            Self::Ed25519 => ED25519_SIGNATURE_LEN,
            Self::EthSign => ETHSIGN_SIGNATURE_LEN,
        }
    }

    /// Public-key length this scheme uses.
    #[must_use]
    pub fn public_key_length(self) -> usize {
        match self {
            Self::Ed25519 => ED25519_PUBLIC_KEY_LEN,
            Self::EthSign => ETHSIGN_PUBLIC_KEY_LEN,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "ed25519"),
            Self::EthSign => write!(f, "ethsign"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_key_length() {
        assert_eq!(Scheme::detect(&[0u8; 32]).unwrap(), Scheme::Ed25519);
        assert_eq!(Scheme::detect(&[0u8; 20]).unwrap(), Scheme::EthSign);
        assert!(matches!(
            Scheme::detect(&[0u8; 33]),
            Err(CryptoError::KeyLength(33))
        ));
    }

    #[test]
    fn wire_byte_round_trip() {
        for scheme in [Scheme::Ed25519, Scheme::EthSign] {
            assert_eq!(Scheme::from_u8(scheme.as_u8()).unwrap(), scheme);
        }
        assert!(Scheme::from_u8(7).is_err());
    }
}
