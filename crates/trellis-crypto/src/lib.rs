//! Cryptographic authority layer for Trellis models.
//!
//! Two signature schemes live behind one dispatch surface:
//!
//! - [`Scheme::Ed25519`]: detached Ed25519 signatures over the raw message
//!   (32-byte public key, 64-byte signature).
//! - [`Scheme::EthSign`]: secp256k1 recoverable ECDSA over the Keccak-256
//!   digest of an Ethereum signed-message envelope (20-byte address as the
//!   public key, 65-byte `r || s || v` signature).
//!
//! The scheme is auto-detected from the public-key length, so callers that
//! only hold a key can still pick the right verification path.
//!
//! Content hashing is Blake2b-256 throughout, exposed as a prefix-safe chain
//! over byte lists ([`hash_list`], [`ChainHasher`]).

#![forbid(unsafe_code)]

pub mod error;
pub mod hash;
pub mod keys;
pub mod scheme;
pub mod sign;

pub use error::{CryptoError, Result};
pub use hash::{hash, hash_list, ChainHasher, HASH_LEN};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use scheme::Scheme;
pub use sign::{sign, signature_length, verify, VerifyItem};
