//! Key material for the two signature schemes.

use ed25519_dalek::SigningKey as DalekSigningKey;
use k256::ecdsa::SigningKey as K256SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};
use crate::scheme::Scheme;

/// A public key, either a 32-byte Ed25519 key or a 20-byte address.
///
/// The length determines the scheme, so this type is self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] Vec<u8>);

impl PublicKey {
    /// Wrap raw public-key bytes, validating the length against the schemes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        Scheme::detect(&bytes)?;
        Ok(Self(bytes))
    }

    /// Scheme implied by this key's length.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        // Length was validated at construction.
        match self.0.len() {
            32 => Scheme::Ed25519,
            _ => Scheme::EthSign,
        }
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte secret scalar, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Wrap raw secret bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material.
        write!(f, "SecretKey(..)")
    }
}

/// A scheme-tagged signing key pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    scheme: Scheme,
    public_key: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a fresh key pair for the given scheme.
    pub fn generate(scheme: Scheme) -> Result<Self> {
        match scheme {
            Scheme::Ed25519 => {
                let signing = DalekSigningKey::generate(&mut OsRng);
                let public = PublicKey::from_bytes(signing.verifying_key().to_bytes().to_vec())?;
                Ok(Self {
                    scheme,
                    public_key: public,
                    secret: SecretKey::from_bytes(signing.to_bytes()),
                })
            }
            Scheme::EthSign => {
                let signing = K256SigningKey::random(&mut OsRng);
                let address = eth_address(&signing);
                Ok(Self {
                    scheme,
                    public_key: PublicKey::from_bytes(address.to_vec())?,
                    secret: SecretKey::from_bytes(signing.to_bytes().into()),
                })
            }
        }
    }

    /// Rebuild a key pair from secret bytes, deriving the public key.
    pub fn from_secret(scheme: Scheme, secret: [u8; 32]) -> Result<Self> {
        match scheme {
            Scheme::Ed25519 => {
                let signing = DalekSigningKey::from_bytes(&secret);
                let public = PublicKey::from_bytes(signing.verifying_key().to_bytes().to_vec())?;
                Ok(Self {
                    scheme,
                    public_key: public,
                    secret: SecretKey::from_bytes(secret),
                })
            }
            Scheme::EthSign => {
                let signing = K256SigningKey::from_bytes(&secret.into())
                    .map_err(|e| CryptoError::SecretKey(e.to_string()))?;
                let address = eth_address(&signing);
                Ok(Self {
                    scheme,
                    public_key: PublicKey::from_bytes(address.to_vec())?,
                    secret: SecretKey::from_bytes(secret),
                })
            }
        }
    }

    /// Scheme this pair signs under.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Public half.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Secret half.
    #[must_use]
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// Derive the 20-byte address of a secp256k1 signing key.
///
/// Keccak-256 of the uncompressed public point (without the SEC1 tag byte),
/// keeping the trailing 20 bytes.
pub(crate) fn eth_address(signing: &K256SigningKey) -> [u8; 20] {
    address_of_verifying_key(signing.verifying_key())
}

/// Address derivation shared with signature recovery.
pub(crate) fn address_of_verifying_key(key: &k256::ecdsa::VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_scheme_lengths() {
        let ed = KeyPair::generate(Scheme::Ed25519).unwrap();
        assert_eq!(ed.public_key().as_bytes().len(), 32);
        assert_eq!(ed.public_key().scheme(), Scheme::Ed25519);

        let eth = KeyPair::generate(Scheme::EthSign).unwrap();
        assert_eq!(eth.public_key().as_bytes().len(), 20);
        assert_eq!(eth.public_key().scheme(), Scheme::EthSign);
    }

    #[test]
    fn from_secret_is_deterministic() {
        let secret = [42u8; 32];
        let a = KeyPair::from_secret(Scheme::Ed25519, secret).unwrap();
        let b = KeyPair::from_secret(Scheme::Ed25519, secret).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn public_key_rejects_bad_lengths() {
        assert!(PublicKey::from_bytes(vec![0u8; 31]).is_err());
        assert!(PublicKey::from_bytes(vec![0u8; 21]).is_err());
    }
}
