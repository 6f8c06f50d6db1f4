//! Blake2b-256 content hashing.
//!
//! All Trellis identities and field digests are Blake2b-256. Lists of byte
//! strings are hashed with a chained construction: the running 32-byte digest
//! is rehashed together with each element. Chaining makes the result
//! prefix-safe (`[a, b]` and `[ab]` hash differently) and lets an absent
//! element still advance the chain by rehashing the digest alone.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Digest length in bytes.
pub const HASH_LEN: usize = 32;

type Blake2b256 = Blake2b<U32>;

/// Single-shot Blake2b-256 of a byte string.
#[must_use]
pub fn hash(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Prefix-safe hash over a list of byte strings.
///
/// Starts from 32 zero bytes; each element folds the previous digest and the
/// element through one Blake2b-256 round. An empty list returns the 32 zero
/// bytes unchanged.
#[must_use]
pub fn hash_list<'a, I>(items: I) -> [u8; HASH_LEN]
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut chain = ChainHasher::new();
    for item in items {
        chain.update(item);
    }
    chain.finalize()
}

/// Incremental chain hasher with the same semantics as [`hash_list`].
#[derive(Debug, Clone)]
pub struct ChainHasher {
    digest: [u8; HASH_LEN],
}

impl ChainHasher {
    /// Start a new chain at the all-zero digest.
    #[must_use]
    pub fn new() -> Self {
        Self {
            digest: [0u8; HASH_LEN],
        }
    }

    /// Continue a chain from an existing digest.
    #[must_use]
    pub fn from_digest(digest: [u8; HASH_LEN]) -> Self {
        Self { digest }
    }

    /// Fold one element into the chain: `digest = H(digest || part)`.
    pub fn update(&mut self, part: &[u8]) {
        let mut hasher = Blake2b256::new();
        hasher.update(self.digest);
        hasher.update(part);
        self.digest = hasher.finalize().into();
    }

    /// Fold several parts as a single chain round: `digest = H(digest || p0 || p1 ...)`.
    pub fn update_parts(&mut self, parts: &[&[u8]]) {
        let mut hasher = Blake2b256::new();
        hasher.update(self.digest);
        for part in parts {
            hasher.update(part);
        }
        self.digest = hasher.finalize().into();
    }

    /// Advance the chain without an element: `digest = H(digest)`.
    ///
    /// Used when a referenced item is absent but must still influence the
    /// final digest.
    pub fn update_absent(&mut self) {
        let mut hasher = Blake2b256::new();
        hasher.update(self.digest);
        self.digest = hasher.finalize().into();
    }

    /// Current digest without consuming the hasher.
    #[must_use]
    pub fn digest(&self) -> [u8; HASH_LEN] {
        self.digest
    }

    /// Consume the hasher and return the digest.
    #[must_use]
    pub fn finalize(self) -> [u8; HASH_LEN] {
        self.digest
    }
}

impl Default for ChainHasher {
    fn default() -> Self {
        Self::new()
    }
}
